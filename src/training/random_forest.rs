//! Random Forest classifier
//!
//! Bagged weighted trees with a random feature subset at every split.
//! Probabilities are the mean of the trees' leaf distributions.

use super::config::{ClassWeight, MaxFeatures};
use super::decision_tree::DecisionTree;
use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub class_weight: ClassWeight,
    pub random_state: Option<u64>,
    n_features: usize,
    #[serde(default)]
    feature_importances: Option<Array1<f64>>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Uniform,
            random_state: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Assemble a forest from already-built trees
    pub fn from_trees(trees: Vec<DecisionTree>) -> Result<Self> {
        let n_features = trees
            .first()
            .map(DecisionTree::n_features)
            .ok_or_else(|| CardioError::InvalidInput("forest needs at least one tree".to_string()))?;
        if trees.iter().any(|t| !t.is_fitted() || t.n_features() != n_features) {
            return Err(CardioError::InvalidInput(
                "trees must be fitted on the same feature count".to_string(),
            ));
        }

        let mut forest = Self::new(trees.len());
        forest.n_features = n_features;
        forest.trees = trees;
        Ok(forest)
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Per-sample weights derived from the class weighting mode
    ///
    /// Balanced weights are `n_samples / (2 * class_count)`.
    pub fn sample_weights(&self, y: &Array1<f64>) -> Array1<f64> {
        match self.class_weight {
            ClassWeight::Uniform => Array1::ones(y.len()),
            ClassWeight::Balanced => {
                let n = y.len() as f64;
                let positives = y.iter().filter(|&&v| v == 1.0).count() as f64;
                let counts = [n - positives, positives];
                y.mapv(|v| {
                    let count = counts[v as usize];
                    if count > 0.0 {
                        n / (2.0 * count)
                    } else {
                        1.0
                    }
                })
            }
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(CardioError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(CardioError::TrainingError("empty training matrix".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(CardioError::TrainingError("n_estimators must be positive".to_string()));
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(CardioError::TrainingError(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }

        self.n_features = n_features;
        let max_features = self.max_features.resolve(n_features);
        let weights = self.sample_weights(y);
        let base_seed = self.random_state.unwrap_or(42);

        debug!(
            n_estimators = self.n_estimators,
            max_features,
            n_samples,
            "Fitting random forest"
        );

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);
                let w_boot = weights.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());
                if let Some(depth) = self.max_depth {
                    tree = tree.with_max_depth(depth);
                }

                tree.fit_weighted(&x_boot, &y_boot, &w_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<DecisionTree>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total += imp;
            }
        }

        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }

    /// Mean class distribution over all trees for one sample
    pub fn predict_proba_row(&self, sample: ArrayView1<f64>) -> Result<[f64; 2]> {
        if self.trees.is_empty() {
            return Err(CardioError::ModelNotFitted);
        }

        let mut sums = [0.0f64; 2];
        for tree in &self.trees {
            let dist = tree.predict_distribution(sample)?;
            sums[0] += dist[0];
            sums[1] += dist[1];
        }

        let total = sums[0] + sums[1];
        Ok([sums[0] / total, sums[1] / total])
    }

    /// Class probabilities, one `[p0, p1]` row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let rows = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict_proba_row(x.row(i)))
            .collect::<Result<Vec<[f64; 2]>>>()?;

        let flat: Vec<f64> = rows.iter().flat_map(|p| p.iter().copied()).collect();
        Ok(Array2::from_shape_vec((rows.len(), 2), flat)?)
    }

    /// Predicted labels; ties go to the positive class
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|p| decide(p[0], p[1]) as f64)
            .collect())
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean depth over the fitted trees
    pub fn mean_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(DecisionTree::get_depth).sum::<usize>() as f64 / self.trees.len() as f64
    }

    pub fn n_leaves(&self) -> usize {
        self.trees.iter().map(DecisionTree::get_n_leaves).sum()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// Decision rule shared by every predictor: label 1 iff `p1 >= p0`
pub fn decide(p0: f64, p1: f64) -> u8 {
    if p1 >= p0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [0.3, 0.1],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
            [1.3, 0.9],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = separable();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = separable();
        let mut rf = RandomForest::new(15)
            .with_random_state(7)
            .with_class_weight(ClassWeight::Balanced);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (8, 2));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = separable();
        let mut a = RandomForest::new(20).with_random_state(42).with_max_depth(4);
        let mut b = RandomForest::new(20).with_random_state(42).with_max_depth(4);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_balanced_weights() {
        let y = array![0.0, 0.0, 0.0, 1.0];
        let rf = RandomForest::new(1).with_class_weight(ClassWeight::Balanced);
        let w = rf.sample_weights(&y);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[3] - 2.0).abs() < 1e-12);

        // Both classes carry equal total weight
        let neg: f64 = w.iter().take(3).sum();
        assert!((neg - w[3]).abs() < 1e-12);
    }

    #[test]
    fn test_decision_rule_ties_positive() {
        assert_eq!(decide(0.5, 0.5), 1);
        assert_eq!(decide(0.6, 0.4), 0);
        assert_eq!(decide(0.3, 0.7), 1);
    }

    #[test]
    fn test_from_trees() {
        let (x, y) = separable();
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let forest = RandomForest::from_trees(vec![tree.clone(), tree]).unwrap();
        assert_eq!(forest.n_trees(), 2);
        assert_eq!(forest.predict(&x).unwrap(), y);
        assert!(RandomForest::from_trees(Vec::new()).is_err());
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut rf = RandomForest::new(10)
            .with_random_state(42)
            .with_max_features(MaxFeatures::All);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_non_binary_labels_rejected() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 1.0, 2.0];

        for weight in [ClassWeight::Balanced, ClassWeight::Uniform] {
            let mut rf = RandomForest::new(2).with_class_weight(weight);
            assert!(matches!(rf.fit(&x, &y), Err(CardioError::TrainingError(_))));
            assert!(!rf.is_fitted());
        }
    }

    #[test]
    fn test_tree_shape_summary() {
        let (x, y) = separable();
        let mut rf = RandomForest::new(5).with_random_state(3).with_max_depth(2);
        rf.fit(&x, &y).unwrap();

        assert!(rf.mean_depth() <= 2.0);
        assert!(rf.n_leaves() >= rf.n_trees());
        assert_eq!(RandomForest::new(5).n_leaves(), 0);
        assert_eq!(RandomForest::new(5).mean_depth(), 0.0);
    }

    #[test]
    fn test_unfitted() {
        let rf = RandomForest::new(3);
        assert!(matches!(rf.predict(&array![[1.0]]), Err(CardioError::ModelNotFitted)));
    }
}
