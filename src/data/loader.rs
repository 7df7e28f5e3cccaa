//! Dataset loading with network fallback

use super::normalize::{normalize_frame, records_from_frame, CodeConvention};
use super::schema::{self, HealthRecord};
use crate::config::PipelineConfig;
use crate::error::{CardioError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Positional column names for the headerless archive file
pub const ARCHIVE_COLUMNS: [&str; 14] = [
    schema::AGE,
    schema::SEX,
    schema::CHEST_PAIN,
    schema::RESTING_BP,
    schema::CHOLESTEROL,
    schema::FASTING_BS,
    schema::RESTING_ECG,
    schema::MAX_HEART_RATE,
    schema::EXERCISE_ANGINA,
    schema::ST_DEPRESSION,
    schema::ST_SLOPE,
    schema::VESSELS,
    schema::THALASSEMIA,
    schema::TARGET,
];

/// Missing-value token used by the archive file
const MISSING_TOKEN: &str = "?";

/// Where a dataset came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum DatasetSource {
    Local(PathBuf),
    Remote(String),
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::Local(path) => write!(f, "local file {}", path.display()),
            DatasetSource::Remote(url) => write!(f, "remote archive {}", url),
        }
    }
}

/// A normalized dataset and its origin
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub frame: DataFrame,
    pub source: DatasetSource,
}

impl LoadedDataset {
    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn records(&self) -> Result<Vec<HealthRecord>> {
        records_from_frame(&self.frame)
    }
}

/// Loads the training dataset from a local CSV, falling back to a remote archive
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    local_path: PathBuf,
    fallback_url: Option<String>,
    timeout: Duration,
}

impl DatasetLoader {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
            fallback_url: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let loader = Self::new(config.dataset_path.clone())
            .with_timeout(Duration::from_secs(config.fetch_timeout_secs));
        if config.fallback_url.is_empty() {
            loader
        } else {
            loader.with_fallback_url(config.fallback_url.clone())
        }
    }

    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback_url = None;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Load and normalize the dataset, trying the local file first
    pub fn load(&self) -> Result<LoadedDataset> {
        let local_err = match self.load_local() {
            Ok(frame) => {
                info!(path = %self.local_path.display(), rows = frame.height(), "Loaded local dataset");
                return Ok(LoadedDataset {
                    frame,
                    source: DatasetSource::Local(self.local_path.clone()),
                });
            }
            Err(e) => e,
        };

        let Some(url) = &self.fallback_url else {
            return Err(CardioError::DataUnavailable {
                local: local_err.to_string(),
                remote: "no fallback source configured".to_string(),
            });
        };

        warn!(
            path = %self.local_path.display(),
            error = %local_err,
            url = %url,
            "Local dataset unavailable, fetching remote archive"
        );

        match self.load_remote(url) {
            Ok(frame) => {
                info!(url = %url, rows = frame.height(), "Loaded remote dataset");
                Ok(LoadedDataset {
                    frame,
                    source: DatasetSource::Remote(url.clone()),
                })
            }
            Err(remote_err) => {
                warn!(url = %url, error = %remote_err, "Remote dataset fetch failed");
                Err(CardioError::DataUnavailable {
                    local: local_err.to_string(),
                    remote: remote_err.to_string(),
                })
            }
        }
    }

    /// Load the dataset as typed records
    pub fn load_dataset(&self) -> Result<Vec<HealthRecord>> {
        self.load()?.records()
    }

    fn load_local(&self) -> Result<DataFrame> {
        let file = File::open(&self.local_path)?;
        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(parse_options())
            .into_reader_with_file_handle(file)
            .finish()?;

        normalize_frame(&raw, CodeConvention::ZeroBased)
    }

    fn load_remote(&self, url: &str) -> Result<DataFrame> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let body = client.get(url).send()?.error_for_status()?.bytes()?;

        let mut raw = CsvReadOptions::default()
            .with_has_header(false)
            .with_infer_schema_length(None)
            .with_parse_options(parse_options())
            .into_reader_with_file_handle(Cursor::new(body.to_vec()))
            .finish()?;

        if raw.width() != ARCHIVE_COLUMNS.len() {
            return Err(CardioError::DataError(format!(
                "archive has {} columns, expected {}",
                raw.width(),
                ARCHIVE_COLUMNS.len()
            )));
        }
        raw.set_column_names(ARCHIVE_COLUMNS)?;

        normalize_frame(&raw, CodeConvention::Cleveland)
    }
}

fn parse_options() -> CsvParseOptions {
    CsvParseOptions::default()
        .with_null_values(Some(NullValues::AllColumnsSingle(MISSING_TOKEN.into())))
}
