//! Cardiorisk - heart disease risk prediction pipeline
//!
//! Loads the clinical training data (local CSV with a remote archive
//! fallback), encodes it, fits a class-balanced random forest and serves
//! predictions from the persisted artifact.
//!
//! # Modules
//!
//! - [`data`] - Dataset loading, schema normalization, typed records
//! - [`preprocessing`] - Median imputation, standard scaling, feature encoding
//! - [`training`] - Decision trees, random forest, evaluation, trainer
//! - [`artifact`] - Persisted model artifacts and the single-flight store
//! - [`inference`] - Predictor, prediction results and history records
//! - [`context`] - Explicit pipeline context
//! - [`cli`] - Command-line interface

pub mod artifact;
pub mod cli;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod inference;
pub mod preprocessing;
pub mod training;

pub use artifact::{ArtifactMetadata, ArtifactStore, ModelArtifact};
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{CardioError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::{ArtifactStore, ModelArtifact};
    pub use crate::config::PipelineConfig;
    pub use crate::context::PipelineContext;
    pub use crate::data::{
        ChestPainType, DatasetLoader, DatasetSource, FeatureSource, Flag, HealthRecord,
        PatientRecord, RestingEcg, Sex, StSlope,
    };
    pub use crate::error::{CardioError, Result};
    pub use crate::inference::{FeatureRow, PredictionRecord, PredictionResult, Predictor, RiskLevel};
    pub use crate::preprocessing::{FeatureEncoder, MissingFeaturePolicy, StandardScaler};
    pub use crate::training::{ModelTrainer, RandomForest, TrainingConfig};
}
