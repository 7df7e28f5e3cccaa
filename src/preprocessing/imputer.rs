//! Median imputation for numeric columns

use crate::error::{CardioError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Fills missing numeric values with the column median computed over the
/// whole table it was fitted on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedianImputer {
    fill_values: HashMap<String, f64>,
    is_fitted: bool,
}

impl MedianImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute medians for the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        for col_name in columns {
            let series = df
                .column(col_name)
                .map_err(|_| CardioError::FeatureNotFound(col_name.to_string()))?
                .as_materialized_series();

            if !series.dtype().is_primitive_numeric() {
                continue;
            }

            let values = series.cast(&DataType::Float64)?;
            match values.f64()?.median() {
                Some(median) => {
                    self.fill_values.insert(col_name.to_string(), median);
                }
                None => debug!(column = %col_name, "Column has no values, median undefined"),
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace nulls with the fitted medians
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CardioError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, &median) in &self.fill_values {
            let Ok(column) = df.column(col_name) else {
                continue;
            };
            let series = column.as_materialized_series();
            if series.null_count() == 0 {
                continue;
            }

            let filled: Float64Chunked = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(median)))
                .collect();
            result.with_column(filled.with_name(series.name().clone()).into_series())?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted median for a column
    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fill_values.get(column).copied()
    }
}
