//! Model training module
//!
//! - Weighted decision trees and the random forest built from them
//! - Train/test splitting, scaling and evaluation
//! - Classification reports

mod config;
mod engine;
pub mod decision_tree;
pub mod metrics;
pub mod random_forest;

pub use config::{ClassWeight, MaxFeatures, TrainingConfig};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{DataSplit, ModelTrainer};
pub use metrics::{ClassMetrics, ClassificationReport};
pub use random_forest::{decide, RandomForest};
