//! Pipeline configuration

use crate::error::{CardioError, Result};
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// UCI archive copy of the Cleveland heart-disease data
pub const DEFAULT_FALLBACK_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/heart-disease/processed.cleveland.data";

/// Paths and settings shared by every pipeline operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local training CSV
    pub dataset_path: PathBuf,
    /// Where the fitted artifact lives
    pub artifact_path: PathBuf,
    /// Headerless archive fetched when the local CSV is unavailable
    pub fallback_url: String,
    pub fetch_timeout_secs: u64,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: std::env::var("CARDIORISK_DATASET_PATH")
                .unwrap_or_else(|_| "data/heart.csv".to_string())
                .into(),
            artifact_path: std::env::var("CARDIORISK_MODEL_PATH")
                .unwrap_or_else(|_| "models/heart_disease_model.json".to_string())
                .into(),
            fallback_url: std::env::var("CARDIORISK_FALLBACK_URL")
                .unwrap_or_else(|_| DEFAULT_FALLBACK_URL.to_string()),
            fetch_timeout_secs: std::env::var("CARDIORISK_FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CardioError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            CardioError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(CardioError::ConfigError(
                "fetch_timeout_secs must be positive".to_string(),
            ));
        }
        if self.artifact_path.as_os_str().is_empty() {
            return Err(CardioError::ConfigError("artifact_path is empty".to_string()));
        }
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder() {
        let config = PipelineConfig::default()
            .with_dataset_path("a.csv")
            .with_artifact_path("m.json")
            .with_fetch_timeout_secs(5);
        assert_eq!(config.dataset_path, PathBuf::from("a.csv"));
        assert_eq!(config.artifact_path, PathBuf::from("m.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"artifact_path": "out/model.json", "training": {{"n_estimators": 25}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.artifact_path, PathBuf::from("out/model.json"));
        assert_eq!(config.training.n_estimators, 25);
        assert_eq!(config.training.max_depth, Some(10));
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(file.path()),
            Err(CardioError::ConfigError(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = PipelineConfig::default().with_fetch_timeout_secs(0);
        assert!(config.validate().is_err());
    }
}
