//! Standard feature scaling

use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Z-score scaler: `(x - mean) / std`
///
/// Uses the population standard deviation. Constant columns get a scale of
/// 1.0 so they pass through centered instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: Array1::zeros(0),
            scale: Array1::zeros(0),
            is_fitted: false,
        }
    }

    /// Build a scaler from known parameters
    pub fn from_params(mean: Array1<f64>, scale: Array1<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(CardioError::ShapeError {
                expected: format!("scale length = {}", mean.len()),
                actual: format!("scale length = {}", scale.len()),
            });
        }
        if scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(CardioError::InvalidInput(
                "scale values must be finite and non-zero".to_string(),
            ));
        }
        Ok(Self {
            mean,
            scale,
            is_fitted: true,
        })
    }

    /// Learn per-column mean and standard deviation
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(CardioError::DataError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| CardioError::DataError("cannot compute column means".to_string()))?;
        let scale = x
            .var_axis(Axis(0), 0.0)
            .mapv(|v| if v > 0.0 { v.sqrt() } else { 1.0 });

        self.mean = mean;
        self.scale = scale;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut scaled = x.to_owned();
        for mut row in scaled.rows_mut() {
            row -= &self.mean;
            row /= &self.scale;
        }
        Ok(scaled)
    }

    /// Scale a single observation
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if !self.is_fitted {
            return Err(CardioError::ModelNotFitted);
        }
        if width != self.mean.len() {
            return Err(CardioError::ShapeError {
                expected: format!("{} features", self.mean.len()),
                actual: format!("{} features", width),
            });
        }
        Ok(())
    }
}
