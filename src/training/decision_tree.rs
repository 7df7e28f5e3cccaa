//! Weighted binary decision tree
//!
//! CART classifier over labels {0, 1} with per-sample weights. Leaves keep
//! the weighted class distribution so a forest can average probabilities.

use super::random_forest::decide;
use crate::error::{CardioError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with class probabilities `[p0, p1]`
    Leaf {
        distribution: [f64; 2],
        n_samples: usize,
    },
    /// Internal node: samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn leaf(weights: [f64; 2], n_samples: usize) -> Self {
        let total = weights[0] + weights[1];
        let distribution = if total > 0.0 {
            [weights[0] / total, weights[1] / total]
        } else {
            [0.5, 0.5]
        };
        TreeNode::Leaf {
            distribution,
            n_samples,
        }
    }
}

/// Candidate split found while scanning one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Binary classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each split (all when `None`)
    pub max_features: Option<usize>,
    pub random_state: u64,
    n_features: usize,
    #[serde(default)]
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
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

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit with uniform sample weights
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let weights = Array1::ones(y.len());
        self.fit_weighted(x, y, &weights)
    }

    /// Fit with per-sample weights
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &Array1<f64>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() || n_samples != sample_weight.len() {
            return Err(CardioError::ShapeError {
                expected: format!("y and weight length = {}", n_samples),
                actual: format!("y length = {}, weight length = {}", y.len(), sample_weight.len()),
            });
        }
        if n_samples == 0 {
            return Err(CardioError::TrainingError("cannot fit tree on zero samples".to_string()));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(CardioError::TrainingError("labels must be 0 or 1".to_string()));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, sample_weight, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let class_weights = class_weight_sums(y, w, indices);
        let parent_impurity = gini(class_weights);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_impurity == 0.0;

        if should_stop {
            return TreeNode::leaf(class_weights, n_samples);
        }

        let Some(best) = self.find_best_split(x, y, w, indices, parent_impurity, rng) else {
            return TreeNode::leaf(class_weights, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        let node_weight = class_weights[0] + class_weights[1];
        importances[best.feature_idx] += node_weight * best.gain;

        let left = Box::new(self.build_tree(x, y, w, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, w, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = x.ncols();
        let n_try = self.max_features.unwrap_or(n_features).clamp(1, n_features);
        let candidates = index::sample(rng, n_features, n_try).into_vec();

        let mut best: Option<SplitCandidate> = None;
        for feature_idx in candidates {
            if let Some(candidate) =
                self.best_split_for_feature(x, y, w, indices, feature_idx, parent_impurity)
            {
                if best.map_or(true, |b| candidate.gain > b.gain) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Sweep the sorted feature values once, moving samples left to right
    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        w: &Array1<f64>,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        if indices.len() < 2 {
            return None;
        }
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

        let total = class_weight_sums(y, w, indices);
        let total_weight = total[0] + total[1];
        let mut left = [0.0f64; 2];
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..sorted.len() - 1 {
            let i = sorted[pos];
            left[y[i] as usize] += w[i];

            let value = x[[i, feature_idx]];
            let next = x[[sorted[pos + 1], feature_idx]];
            if value == next {
                continue;
            }

            let n_left = pos + 1;
            let n_right = sorted.len() - n_left;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let right = [total[0] - left[0], total[1] - left[1]];
            let left_weight = left[0] + left[1];
            let right_weight = right[0] + right[1];
            let weighted_impurity =
                (left_weight * gini(left) + right_weight * gini(right)) / total_weight;
            let gain = parent_impurity - weighted_impurity;

            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (value + next) / 2.0,
                    gain,
                });
            }
        }

        best
    }

    /// Class distribution `[p0, p1]` for one sample
    pub fn predict_distribution(&self, sample: ArrayView1<f64>) -> Result<[f64; 2]> {
        let root = self.root.as_ref().ok_or(CardioError::ModelNotFitted)?;
        if sample.len() != self.n_features {
            return Err(CardioError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", sample.len()),
            });
        }

        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { distribution, .. } => return Ok(*distribution),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if sample[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Class probabilities, one row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let dist = self.predict_distribution(row)?;
            proba[[i, 0]] = dist[0];
            proba[[i, 1]] = dist[1];
        }
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|p| decide(p[0], p[1]) as f64)
            .collect())
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

fn class_weight_sums(y: &Array1<f64>, w: &Array1<f64>, indices: &[usize]) -> [f64; 2] {
    let mut sums = [0.0; 2];
    for &i in indices {
        sums[y[i] as usize] += w[i];
    }
    sums
}

fn gini(weights: [f64; 2]) -> f64 {
    let total = weights[0] + weights[1];
    if total <= 0.0 {
        return 0.0;
    }
    let p0 = weights[0] / total;
    let p1 = weights[1] / total;
    1.0 - p0 * p0 - p1 * p1
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 1.0], [4.0, 1.0], [5.0, 1.0], [6.0, 0.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert!(tree.is_fitted());
    }

    #[test]
    fn test_leaf_distribution_sums_to_one() {
        let x = array![[1.0], [1.0], [2.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sample_weights_shift_leaf() {
        // Single leaf: the weights alone decide the distribution
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 1.0];
        let w = array![1.0, 1.0, 6.0];

        let mut tree = DecisionTree::new();
        tree.fit_weighted(&x, &y, &w).unwrap();

        let dist = tree.predict_distribution(x.row(0)).unwrap();
        assert!((dist[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_predict_tie_goes_positive() {
        let x = array![[1.0], [1.0]];
        let y = array![0.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let dist = tree.predict_distribution(x.row(0)).unwrap();
        assert_eq!(dist[0], dist[1]);
        assert_eq!(tree.predict(&x).unwrap(), array![1.0, 1.0]);
    }

    #[test]
    fn test_max_depth() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..40).map(|i| (i % 2) as f64).collect();

        let mut tree = DecisionTree::new().with_max_depth(3);
        tree.fit(&x, &y).unwrap();
        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        fn check(node: &TreeNode, min_leaf: usize) {
            match node {
                TreeNode::Leaf { n_samples, .. } => assert!(*n_samples >= min_leaf),
                TreeNode::Split { left, right, .. } => {
                    check(left, min_leaf);
                    check(right, min_leaf);
                }
            }
        }

        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y: Array1<f64> = (0..30).map(|i| ((i * 5) % 3 == 0) as u8 as f64).collect();
        let mut tree = DecisionTree::new().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();
        check(tree.root.as_ref().unwrap(), 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let imp = tree.feature_importances().unwrap();
        assert!((imp[0] - 1.0).abs() < 1e-12);
        assert_eq!(imp[1], 0.0);
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let x = array![[1.0], [2.0]];
        let y = array![0.0, 2.0];
        assert!(DecisionTree::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_unfitted() {
        let tree = DecisionTree::new();
        let x = array![[1.0]];
        assert!(matches!(tree.predict(&x), Err(CardioError::ModelNotFitted)));
    }
}
