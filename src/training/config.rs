//! Training configuration

use crate::error::{CardioError, Result};
use crate::preprocessing::MissingFeaturePolicy;
use serde::{Deserialize, Serialize};

/// How samples are weighted by class during tree construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample counts once
    Uniform,
    /// Weights inversely proportional to class frequency
    #[default]
    Balanced,
}

/// Number of features drawn at each split
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of n_features
    #[default]
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Configuration for model training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Seed for the split shuffle and the forest
    pub random_seed: u64,

    /// Number of trees
    pub n_estimators: usize,

    /// Maximum depth of trees
    pub max_depth: Option<usize>,

    /// Minimum samples to split a node
    pub min_samples_split: usize,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    pub class_weight: ClassWeight,

    pub max_features: MaxFeatures,

    /// Keep class proportions equal across the split
    pub stratify: bool,

    /// Handling of feature columns that still hold missing values
    pub missing_features: MissingFeaturePolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_seed: 42,
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 2,
            class_weight: ClassWeight::Balanced,
            max_features: MaxFeatures::Sqrt,
            stratify: false,
            missing_features: MissingFeaturePolicy::Reject,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn with_missing_features(mut self, policy: MissingFeaturePolicy) -> Self {
        self.missing_features = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(CardioError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(CardioError::ConfigError("n_estimators must be positive".to_string()));
        }
        if self.max_depth == Some(0) {
            return Err(CardioError::ConfigError("max_depth must be positive".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(CardioError::ConfigError("min_samples_split must be at least 2".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(CardioError::ConfigError("min_samples_leaf must be positive".to_string()));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(CardioError::ConfigError(format!(
                    "max_features fraction must be in (0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.max_depth, Some(10));
        assert_eq!(config.min_samples_leaf, 2);
        assert_eq!(config.class_weight, ClassWeight::Balanced);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(TrainingConfig::new().with_test_size(1.0).validate().is_err());
        assert!(TrainingConfig::new().with_n_estimators(0).validate().is_err());
        assert!(TrainingConfig::new().with_max_depth(0).validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"n_estimators": 10, "class_weight": "uniform"}"#).unwrap();
        assert_eq!(config.n_estimators, 10);
        assert_eq!(config.class_weight, ClassWeight::Uniform);
        assert_eq!(config.random_seed, 42);
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(11), 4);
        assert_eq!(MaxFeatures::All.resolve(11), 11);
        assert_eq!(MaxFeatures::Fixed(50).resolve(11), 11);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(11), 1);
    }
}
