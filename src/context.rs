//! Explicit pipeline context
//!
//! Built once at startup and passed to every pipeline call. Holds the
//! configuration, the artifact store and the currently loaded artifact.

use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::config::PipelineConfig;
use crate::data::schema::FeatureSource;
use crate::data::{DatasetLoader, LoadedDataset};
use crate::error::Result;
use crate::inference::{PredictionResult, Predictor};
use crate::training::ModelTrainer;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct PipelineContext {
    config: PipelineConfig,
    loader: DatasetLoader,
    trainer: ModelTrainer,
    store: ArtifactStore,
    artifact: RwLock<Option<Arc<ModelArtifact>>>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            loader: DatasetLoader::from_config(&config),
            trainer: ModelTrainer::new(config.training.clone()),
            store: ArtifactStore::new(config.artifact_path.clone()),
            artifact: RwLock::new(None),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn loader(&self) -> &DatasetLoader {
        &self.loader
    }

    pub fn load_dataset(&self) -> Result<LoadedDataset> {
        self.loader.load()
    }

    /// Cached or persisted artifact, without ever training
    pub fn try_load(&self) -> Option<Arc<ModelArtifact>> {
        if let Some(artifact) = self.artifact.read().as_ref() {
            return Some(Arc::clone(artifact));
        }
        let artifact = Arc::new(self.store.try_load()?);
        *self.artifact.write() = Some(Arc::clone(&artifact));
        Some(artifact)
    }

    /// Artifact for prediction, training on a cold start
    pub fn artifact(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.artifact.read().as_ref() {
            return Ok(Arc::clone(artifact));
        }

        let artifact = Arc::new(
            self.store
                .load_or_train(|| self.trainer.fit_from_loader(&self.loader))?,
        );
        *self.artifact.write() = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Eagerly load or train the artifact at startup
    pub fn warm_up(&self) -> Result<()> {
        let artifact = self.artifact()?;
        info!(
            path = %self.store.path().display(),
            features = artifact.n_features(),
            "Pipeline ready"
        );
        Ok(())
    }

    /// Train a fresh artifact, persist it and swap it in
    pub fn retrain(&self) -> Result<Arc<ModelArtifact>> {
        let artifact = Arc::new(self.trainer.train(&self.loader, &self.store)?);
        *self.artifact.write() = Some(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Forget the cached artifact so the next call goes back to the store
    pub fn invalidate(&self) {
        *self.artifact.write() = None;
    }

    pub fn predictor(&self) -> Result<Predictor> {
        Ok(Predictor::new(self.artifact()?))
    }

    pub fn predict<S: FeatureSource + ?Sized>(&self, record: &S) -> Result<PredictionResult> {
        self.predictor()?.predict(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TrainingConfig;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_dataset(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("heart.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "age,sex,cp,trestbps,chol,fbs,restecg,thalach,exang,oldpeak,slope,target").unwrap();
        for i in 0..40 {
            let sick = i % 2;
            writeln!(
                file,
                "{},{},{},{},{},0,{},{},{},{:.1},{},{}",
                40 + i,
                i % 2,
                if sick == 1 { 3 } else { i % 3 },
                120 + i,
                200 + 2 * i,
                i % 3,
                180 - 30 * sick - i % 7,
                sick,
                0.5 + 1.5 * sick as f64,
                1 + sick,
                sick
            )
            .unwrap();
        }
        path
    }

    fn context(dir: &TempDir) -> PipelineContext {
        let config = PipelineConfig::default()
            .with_dataset_path(write_dataset(dir))
            .with_artifact_path(dir.path().join("model.json"))
            .with_fallback_url("")
            .with_training(TrainingConfig::default().with_n_estimators(8));
        PipelineContext::new(config).unwrap()
    }

    #[test]
    fn test_cold_start_then_cached() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        assert!(ctx.try_load().is_none());
        let first = ctx.artifact().unwrap();
        let second = ctx.artifact().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.store().training_runs(), 1);
        assert!(ctx.store().exists());
    }

    #[test]
    fn test_retrain_replaces_cache() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);

        let first = ctx.artifact().unwrap();
        let second = ctx.retrain().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.feature_names, second.feature_names);
        assert!(Arc::ptr_eq(&second, &ctx.artifact().unwrap()));
    }

    #[test]
    fn test_invalid_config() {
        let config = PipelineConfig::default().with_fetch_timeout_secs(0);
        assert!(PipelineContext::new(config).is_err());
    }
}
