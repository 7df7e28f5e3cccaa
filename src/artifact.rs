//! Persisted model artifacts
//!
//! An artifact bundles the fitted forest, the fitted scaler and the ordered
//! feature-name list. It is written whole to a sibling temp file and renamed
//! into place, so readers never observe a partially written artifact.

use crate::data::DatasetSource;
use crate::error::{CardioError, Result};
use crate::preprocessing::StandardScaler;
use crate::training::{ClassificationReport, RandomForest};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Training provenance stored next to the model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactMetadata {
    pub trained_at: DateTime<Utc>,
    pub crate_version: String,
    pub dataset_source: Option<DatasetSource>,
    pub n_train: usize,
    pub n_test: usize,
    pub report: Option<ClassificationReport>,
}

impl ArtifactMetadata {
    pub fn new() -> Self {
        Self {
            trained_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }
}

/// Fitted classifier, scaler and feature order with a shared lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: RandomForest,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

impl ModelArtifact {
    pub fn new(
        model: RandomForest,
        scaler: StandardScaler,
        feature_names: Vec<String>,
        metadata: ArtifactMetadata,
    ) -> Result<Self> {
        let artifact = Self {
            model,
            scaler,
            feature_names,
            metadata,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check that the three components agree on the feature count
    pub fn validate(&self) -> Result<()> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(CardioError::InvalidInput("artifact has no features".to_string()));
        }
        if !self.model.is_fitted() {
            return Err(CardioError::ModelNotFitted);
        }
        if self.scaler.n_features() != n || self.model.n_features() != n {
            return Err(CardioError::ShapeError {
                expected: format!("{} features", n),
                actual: format!(
                    "scaler has {}, model has {}",
                    self.scaler.n_features(),
                    self.model.n_features()
                ),
            });
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: Self = serde_json::from_str(json)?;
        artifact.validate()?;
        Ok(artifact)
    }
}

static TRAINING_GATES: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Gate shared by every store pointing at `path`
fn training_gate(path: &Path) -> Arc<Mutex<()>> {
    let gates = TRAINING_GATES.get_or_init(|| Mutex::new(HashMap::new()));
    Arc::clone(gates.lock().entry(path.to_path_buf()).or_default())
}

/// File-backed artifact storage with a single-flight training gate
///
/// The gate is keyed by artifact path, so concurrent cold starts through any
/// store on the same path train at most once. The training counter is shared
/// by clones only.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
    gate: Arc<Mutex<()>>,
    training_runs: Arc<AtomicUsize>,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            gate: training_gate(&path),
            path,
            training_runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Number of times `load_or_train` had to train
    pub fn training_runs(&self) -> usize {
        self.training_runs.load(Ordering::SeqCst)
    }

    /// Atomically replace the artifact on disk
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let persistence = |source: io::Error| CardioError::Persistence {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }

        let tmp_path = self.temp_path();
        let write = || -> io::Result<()> {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, artifact).map_err(io::Error::from)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        };

        if let Err(e) = write().and_then(|_| fs::rename(&tmp_path, &self.path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(persistence(e));
        }

        info!(path = %self.path.display(), features = artifact.n_features(), "Artifact persisted");
        Ok(())
    }

    /// Read the artifact, surfacing corruption as `ArtifactCorrupt`
    pub fn read(&self) -> Result<ModelArtifact> {
        let bytes = fs::read(&self.path)?;
        let corrupt = |reason: String| CardioError::ArtifactCorrupt {
            path: self.path.clone(),
            reason,
        };

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        artifact.validate().map_err(|e| corrupt(e.to_string()))?;
        Ok(artifact)
    }

    /// Load the artifact if present and intact
    pub fn try_load(&self) -> Option<ModelArtifact> {
        match self.read() {
            Ok(artifact) => {
                debug!(path = %self.path.display(), "Artifact loaded");
                Some(artifact)
            }
            Err(CardioError::IoError(e)) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No artifact found");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Artifact unreadable, discarding");
                None
            }
        }
    }

    /// Return the persisted artifact, training and persisting one on a miss
    ///
    /// Concurrent callers on the same path wait on one gate; whoever wins
    /// trains, the rest find the fresh artifact on their re-check.
    pub fn load_or_train<F>(&self, train: F) -> Result<ModelArtifact>
    where
        F: FnOnce() -> Result<ModelArtifact>,
    {
        if let Some(artifact) = self.try_load() {
            return Ok(artifact);
        }

        let _guard = self.gate.lock();
        if let Some(artifact) = self.try_load() {
            debug!(path = %self.path.display(), "Artifact produced by a concurrent caller");
            return Ok(artifact);
        }

        info!(path = %self.path.display(), "Training artifact on cold start");
        self.training_runs.fetch_add(1, Ordering::SeqCst);
        let artifact = train()?;
        self.save(&artifact)?;
        Ok(artifact)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.path
            .with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), nanos))
    }
}
