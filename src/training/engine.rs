//! Training engine
//!
//! Load, encode, split, scale, fit, evaluate, persist.

use super::config::TrainingConfig;
use super::metrics::ClassificationReport;
use super::random_forest::RandomForest;
use crate::artifact::{ArtifactMetadata, ArtifactStore, ModelArtifact};
use crate::data::{DatasetLoader, DatasetSource, LoadedDataset};
use crate::error::{CardioError, Result};
use crate::preprocessing::{EncodedDataset, FeatureEncoder, StandardScaler};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::info;

/// Train/test partition of an encoded dataset
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Fits heart-disease classifiers
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the dataset, fit an artifact and persist it
    pub fn train(&self, loader: &DatasetLoader, store: &ArtifactStore) -> Result<ModelArtifact> {
        let artifact = self.fit_from_loader(loader)?;
        store.save(&artifact)?;
        Ok(artifact)
    }

    /// Load the dataset and fit an artifact without persisting it
    pub fn fit_from_loader(&self, loader: &DatasetLoader) -> Result<ModelArtifact> {
        let dataset = loader.load()?;
        self.fit_dataset(&dataset)
    }

    pub fn fit_dataset(&self, dataset: &LoadedDataset) -> Result<ModelArtifact> {
        let encoded = FeatureEncoder::new()
            .with_missing_policy(self.config.missing_features)
            .encode(&dataset.frame)?;
        self.fit_encoded(&encoded, Some(dataset.source.clone()))
    }

    pub fn fit_encoded(
        &self,
        encoded: &EncodedDataset,
        source: Option<DatasetSource>,
    ) -> Result<ModelArtifact> {
        self.config.validate()?;
        let start = Instant::now();

        let split = self.split(&encoded.features, &encoded.labels)?;

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(&split.x_train)?;
        let x_test = scaler.transform(&split.x_test)?;

        let mut model = self.build_model();
        model.fit(&x_train, &split.y_train)?;

        let y_pred = model.predict(&x_test)?;
        let report = ClassificationReport::compute(&split.y_test, &y_pred)?;

        info!(
            n_train = split.y_train.len(),
            n_test = split.y_test.len(),
            accuracy = report.accuracy,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Model trained"
        );

        let metadata = ArtifactMetadata {
            dataset_source: source,
            n_train: split.y_train.len(),
            n_test: split.y_test.len(),
            report: Some(report),
            ..ArtifactMetadata::new()
        };

        ModelArtifact::new(model, scaler, encoded.feature_names.clone(), metadata)
    }

    fn build_model(&self) -> RandomForest {
        let mut model = RandomForest::new(self.config.n_estimators)
            .with_min_samples_split(self.config.min_samples_split)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_max_features(self.config.max_features)
            .with_class_weight(self.config.class_weight)
            .with_random_state(self.config.random_seed);
        if let Some(depth) = self.config.max_depth {
            model = model.with_max_depth(depth);
        }
        model
    }

    /// Seeded shuffle split; the test side gets `ceil(test_size * n)` rows
    pub fn split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<DataSplit> {
        let n = x.nrows();
        if n != y.len() {
            return Err(CardioError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n < 2 {
            return Err(CardioError::DataError(format!(
                "need at least 2 rows to split, got {}",
                n
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_seed);
        let (train_idx, test_idx) = if self.config.stratify {
            self.stratified_indices(y, &mut rng)?
        } else {
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(&mut rng);
            let n_test = test_count(n, self.config.test_size);
            let test = indices[..n_test].to_vec();
            let train = indices[n_test..].to_vec();
            (train, test)
        };

        Ok(DataSplit {
            x_train: x.select(Axis(0), &train_idx),
            x_test: x.select(Axis(0), &test_idx),
            y_train: y.select(Axis(0), &train_idx),
            y_test: y.select(Axis(0), &test_idx),
        })
    }

    fn stratified_indices(
        &self,
        y: &Array1<f64>,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (i, &label) in y.iter().enumerate() {
            by_class[(label > 0.5) as usize].push(i);
        }

        let mut train = Vec::new();
        let mut test = Vec::new();
        for indices in by_class.iter_mut().filter(|c| !c.is_empty()) {
            indices.shuffle(rng);
            let n_test = test_count(indices.len(), self.config.test_size);
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        if train.is_empty() || test.is_empty() {
            return Err(CardioError::DataError(
                "stratified split produced an empty partition".to_string(),
            ));
        }
        train.sort_unstable();
        test.sort_unstable();
        Ok((train, test))
    }
}

/// Rows for the test side: at least one, never all
fn test_count(n: usize, test_size: f64) -> usize {
    let n_test = (n as f64 * test_size).ceil() as usize;
    n_test.clamp(1, n.saturating_sub(1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn synthetic(n: usize) -> EncodedDataset {
        let features = Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 3)) % 17) as f64);
        let labels: Array1<f64> = (0..n)
            .map(|i| if features[[i, 0]] + features[[i, 1]] > 16.0 { 1.0 } else { 0.0 })
            .collect();
        EncodedDataset {
            features,
            labels,
            feature_names: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig::default().with_n_estimators(10)
    }

    #[test]
    fn test_split_sizes() {
        let trainer = ModelTrainer::new(small_config());
        let x = Array::from_shape_fn((303, 2), |(i, j)| (i + j) as f64);
        let y: Array1<f64> = (0..303).map(|i| (i % 2) as f64).collect();

        let split = trainer.split(&x, &y).unwrap();
        assert_eq!(split.x_test.nrows(), 61);
        assert_eq!(split.x_train.nrows(), 242);
        assert_eq!(split.y_train.len(), 242);
    }

    #[test]
    fn test_split_is_seeded() {
        let trainer = ModelTrainer::new(small_config());
        let x = Array::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..50).map(|i| (i % 2) as f64).collect();

        let a = trainer.split(&x, &y).unwrap();
        let b = trainer.split(&x, &y).unwrap();
        assert_eq!(a.x_test, b.x_test);

        let other = ModelTrainer::new(small_config().with_random_seed(7));
        let c = other.split(&x, &y).unwrap();
        assert_ne!(a.x_test, c.x_test);
    }

    #[test]
    fn test_stratified_split_keeps_both_classes() {
        let trainer = ModelTrainer::new(small_config().with_stratify(true));
        let x = Array::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..20).map(|i| if i < 5 { 1.0 } else { 0.0 }).collect();

        let split = trainer.split(&x, &y).unwrap();
        assert_eq!(split.y_test.iter().filter(|&&v| v == 1.0).count(), 1);
        assert_eq!(split.y_test.len(), 4);
    }

    #[test]
    fn test_fit_encoded() {
        let trainer = ModelTrainer::new(small_config());
        let artifact = trainer.fit_encoded(&synthetic(120), None).unwrap();

        assert_eq!(artifact.feature_names, vec!["a", "b", "c"]);
        assert_eq!(artifact.scaler.n_features(), 3);
        assert_eq!(artifact.model.n_trees(), 10);
        assert_eq!(artifact.metadata.n_test, 24);
        assert!(artifact.metadata.report.is_some());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = synthetic(100);
        let trainer = ModelTrainer::new(small_config());
        let a = trainer.fit_encoded(&data, None).unwrap();
        let b = trainer.fit_encoded(&data, None).unwrap();

        assert_eq!(a.model, b.model);
        assert_eq!(a.scaler, b.scaler);
    }

    #[test]
    fn test_invalid_config() {
        let trainer = ModelTrainer::new(small_config().with_test_size(0.0));
        assert!(matches!(
            trainer.fit_encoded(&synthetic(20), None),
            Err(CardioError::ConfigError(_))
        ));
    }
}
