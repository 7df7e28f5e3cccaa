//! Single-record and batch prediction against a loaded artifact

use crate::artifact::ModelArtifact;
use crate::data::schema::FeatureSource;
use crate::error::{CardioError, Result};
use crate::training::decide;
use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Free-form named feature values, e.g. parsed from a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRow(BTreeMap<String, f64>);

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Snapshot any feature source over the given names
    pub fn from_source<S: FeatureSource + ?Sized>(source: &S, names: &[String]) -> Self {
        names
            .iter()
            .filter_map(|name| source.feature(name).map(|v| (name.clone(), v)))
            .collect()
    }
}

impl FromIterator<(String, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FeatureSource for FeatureRow {
    fn feature(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }
}

/// Human-facing risk label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Low,
}

impl RiskLevel {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

/// Predicted label and the two-class probability vector `[p0, p1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: u8,
    pub probabilities: [f64; 2],
}

impl PredictionResult {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_label(self.label)
    }

    /// Probability of the predicted class
    pub fn risk_probability(&self) -> f64 {
        self.probabilities[self.label as usize]
    }
}

/// Read-only predictor over a shared artifact
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: Arc<ModelArtifact>,
}

impl Predictor {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    /// Project a record onto the artifact's feature order
    ///
    /// Every missing feature is reported at once; extra fields are ignored.
    pub fn project<S: FeatureSource + ?Sized>(&self, record: &S) -> Result<Array1<f64>> {
        let mut values = Vec::with_capacity(self.artifact.feature_names.len());
        let mut missing = Vec::new();

        for name in &self.artifact.feature_names {
            match record.feature(name) {
                Some(v) if v.is_finite() => values.push(v),
                Some(v) => {
                    return Err(CardioError::InvalidInput(format!(
                        "feature '{}' is not finite: {}",
                        name, v
                    )))
                }
                None => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(CardioError::SchemaMismatch { missing });
        }
        Ok(Array1::from_vec(values))
    }

    pub fn predict<S: FeatureSource + ?Sized>(&self, record: &S) -> Result<PredictionResult> {
        let projected = self.project(record)?;
        let scaled = self.artifact.scaler.transform_row(projected.view())?;
        let probabilities = self.artifact.model.predict_proba_row(scaled.view())?;

        Ok(PredictionResult {
            label: decide(probabilities[0], probabilities[1]),
            probabilities,
        })
    }

    /// Predict many records in parallel; fails as a whole on the first bad record
    pub fn predict_batch<S: FeatureSource + Sync>(
        &self,
        records: &[S],
    ) -> Result<Vec<PredictionResult>> {
        records.par_iter().map(|r| self.predict(r)).collect()
    }
}
