//! Data preprocessing module
//!
//! - Median imputation of missing values
//! - Standard scaling of the feature matrix
//! - Encoding of normalized tables into features and labels

mod encoder;
mod imputer;
mod scaler;

pub use encoder::{EncodedDataset, FeatureEncoder, MissingFeaturePolicy};
pub use imputer::MedianImputer;
pub use scaler::StandardScaler;
