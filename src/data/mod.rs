//! Dataset access
//!
//! Loading, schema normalization and the canonical record types.

pub mod loader;
pub mod normalize;
pub mod schema;

pub use loader::{DatasetLoader, DatasetSource, LoadedDataset};
pub use normalize::{normalize_frame, records_from_frame, CodeConvention, SchemaVariant};
pub use schema::{
    ChestPainType, FeatureSource, Flag, HealthRecord, PatientRecord, RestingEcg, Sex, StSlope,
};
