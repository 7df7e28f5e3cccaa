//! Feature encoding
//!
//! Turns a normalized dataset table into the numeric feature matrix and
//! label vector the classifier consumes.

use crate::data::schema::{self, Sex, TARGET};
use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do with a feature column that still holds missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFeaturePolicy {
    /// Fail the encode with a `DataError`
    #[default]
    Reject,
    /// Drop the column and keep going
    Drop,
}

/// Encoded training data
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
    pub feature_names: Vec<String>,
}

impl EncodedDataset {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Count of samples per class as `(negatives, positives)`
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.labels.iter().filter(|&&y| y == 1.0).count();
        (self.labels.len() - positives, positives)
    }
}

/// Splits a normalized table into features and labels
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    missing_policy: MissingFeaturePolicy,
}

impl FeatureEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_policy(mut self, policy: MissingFeaturePolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    pub fn encode(&self, df: &DataFrame) -> Result<EncodedDataset> {
        if df.height() == 0 {
            return Err(CardioError::DataError("dataset has no rows".to_string()));
        }

        let labels = self.encode_labels(df)?;

        let mut feature_names = Vec::new();
        let mut columns: Vec<Vec<f64>> = Vec::new();
        for name in df.get_column_names() {
            let name = name.as_str();
            if name == TARGET {
                continue;
            }

            let series = if name == schema::SEX {
                sex_codes(df)?
            } else {
                df.column(name)?
                    .as_materialized_series()
                    .cast(&DataType::Float64)?
            };

            if series.null_count() > 0 {
                match self.missing_policy {
                    MissingFeaturePolicy::Reject => {
                        return Err(CardioError::DataError(format!(
                            "feature '{}' has {} missing values after imputation",
                            name,
                            series.null_count()
                        )));
                    }
                    MissingFeaturePolicy::Drop => {
                        warn!(feature = name, missing = series.null_count(), "Dropping feature with missing values");
                        continue;
                    }
                }
            }

            let values: Vec<f64> = series.f64()?.into_no_null_iter().collect();
            feature_names.push(name.to_string());
            columns.push(values);
        }

        if columns.is_empty() {
            return Err(CardioError::DataError("no usable feature columns".to_string()));
        }

        let features = Array2::from_shape_fn((df.height(), columns.len()), |(i, j)| columns[j][i]);
        debug!(
            rows = features.nrows(),
            features = features.ncols(),
            "Encoded dataset"
        );

        Ok(EncodedDataset {
            features,
            labels,
            feature_names,
        })
    }

    fn encode_labels(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let target = df
            .column(TARGET)
            .map_err(|_| CardioError::FeatureNotFound(TARGET.to_string()))?
            .as_materialized_series()
            .cast(&DataType::Float64)?;

        target
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(y) if y == 0.0 || y == 1.0 => Ok(y),
                Some(y) => Err(CardioError::DataError(format!(
                    "label {} in row {} is not binary",
                    y, row
                ))),
                None => Err(CardioError::DataError(format!("missing label in row {}", row))),
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }
}

/// Convert the display-form sex column back to 0/1
fn sex_codes(df: &DataFrame) -> Result<Series> {
    let series = df.column(schema::SEX)?.as_materialized_series();
    if series.dtype() != &DataType::String {
        return Ok(series.cast(&DataType::Float64)?);
    }

    let codes = series
        .str()?
        .into_iter()
        .map(|opt| match opt {
            Some(label) => Sex::from_label(label)
                .map(|sex| Some(u8::from(sex) as f64))
                .ok_or_else(|| {
                    CardioError::DataError(format!("unknown sex label '{}'", label))
                }),
            None => Ok(None),
        })
        .collect::<Result<Vec<Option<f64>>>>()?;

    let codes: Float64Chunked = codes.into_iter().collect();
    Ok(codes.with_name(series.name().clone()).into_series())
}
