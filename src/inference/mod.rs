//! Inference module
//!
//! Name-matched projection of input records onto the artifact's feature
//! order, scaling, and forest probabilities. Prediction never mutates the
//! artifact and performs no I/O.

mod predictor;
mod record;

pub use crate::data::schema::FeatureSource;
pub use predictor::{FeatureRow, PredictionResult, Predictor, RiskLevel};
pub use record::PredictionRecord;
