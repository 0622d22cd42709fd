//! Decision tree implementation
//!
//! CART-style binary tree. Classification targets are class indices
//! `0..n_classes`; leaves keep the class distribution of their samples so
//! ensembles can average probabilities. Regression trees are used as the weak
//! learners of gradient boosting.

use crate::error::{DatalabError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        /// Class proportions (classification only)
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; all when `None`
    pub max_features: Option<usize>,
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

/// Best split found for one node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Running sufficient statistics of one side of a split
#[derive(Clone)]
enum SideStats {
    Classes { counts: Vec<f64>, n: f64 },
    Moments { sum: f64, sq_sum: f64, n: f64 },
}

impl SideStats {
    fn empty(n_classes: Option<usize>) -> Self {
        match n_classes {
            Some(k) => SideStats::Classes { counts: vec![0.0; k], n: 0.0 },
            None => SideStats::Moments { sum: 0.0, sq_sum: 0.0, n: 0.0 },
        }
    }

    fn add(&mut self, y: f64, sign: f64) {
        match self {
            SideStats::Classes { counts, n } => {
                counts[y as usize] += sign;
                *n += sign;
            }
            SideStats::Moments { sum, sq_sum, n } => {
                *sum += sign * y;
                *sq_sum += sign * y * y;
                *n += sign;
            }
        }
    }

    fn n(&self) -> f64 {
        match self {
            SideStats::Classes { n, .. } | SideStats::Moments { n, .. } => *n,
        }
    }

    /// Gini for class counts, variance for moments
    fn impurity(&self) -> f64 {
        match self {
            SideStats::Classes { counts, n } => gini(counts, *n),
            SideStats::Moments { sum, sq_sum, n } => {
                if *n <= 0.0 {
                    0.0
                } else {
                    // Var = E[X²] - E[X]²
                    (sq_sum / n - (sum / n).powi(2)).max(0.0)
                }
            }
        }
    }
}

fn gini(counts: &[f64], n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|&c| (c / n).powi(2)).sum::<f64>()
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fix the number of classes; needed when a bootstrap sample may miss one
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(DatalabError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(DatalabError::TrainingFailed(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }

        if self.is_classification {
            if let Some(bad) = y.iter().find(|v| **v < 0.0 || v.fract() != 0.0) {
                return Err(DatalabError::TrainingFailed(format!(
                    "Class labels must be non-negative indices, got {}",
                    bad
                )));
            }
            let max_class = y.iter().fold(0.0f64, |m, &v| m.max(v)) as usize;
            self.n_classes = self.n_classes.max(max_class + 1);
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, &mut importances, &mut rng);
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

    fn node_stats(&self, y: &Array1<f64>, indices: &[usize]) -> SideStats {
        let mut stats = SideStats::empty(self.is_classification.then_some(self.n_classes));
        for &i in indices {
            stats.add(y[i], 1.0);
        }
        stats
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(y, indices);
        let impurity = stats.impurity();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.make_leaf(&stats, n_samples);
        }

        let features = self.candidate_features(rng);
        let Some(best) = self.find_best_split(x, y, indices, &features, &stats, impurity) else {
            return self.make_leaf(&stats, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut picked = index::sample(rng, self.n_features, k).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Sort each candidate feature once and sweep the split point left to right,
    /// moving one sample at a time from the right statistics to the left.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent: &SideStats,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len() as f64;
        let min_leaf = self.min_samples_leaf as f64;
        let n_classes = self.is_classification.then_some(self.n_classes);

        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut column: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                column.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left = SideStats::empty(n_classes);
                let mut right = parent.clone();
                let mut best: Option<SplitCandidate> = None;

                for i in 0..column.len() - 1 {
                    let (xi, yi) = column[i];
                    left.add(yi, 1.0);
                    right.add(yi, -1.0);

                    let next = column[i + 1].0;
                    if next <= xi {
                        continue;
                    }
                    if left.n() < min_leaf || right.n() < min_leaf {
                        continue;
                    }

                    let weighted = (left.n() * left.impurity()
                        + right.n() * right.impurity())
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                        let mid = xi + (next - xi) / 2.0;
                        // adjacent floats: the midpoint may round up to `next`
                        let threshold = if mid < next { mid } else { xi };
                        best = Some(SplitCandidate { feature_idx, threshold, gain });
                    }
                }
                best
            })
            .collect();

        // first feature wins ties so results do not depend on thread timing
        per_feature
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(a) if a.gain >= cand.gain => Some(a),
                _ => Some(cand),
            })
    }

    fn make_leaf(&self, stats: &SideStats, n_samples: usize) -> TreeNode {
        match stats {
            SideStats::Classes { counts, n } => {
                let distribution: Vec<f64> = counts
                    .iter()
                    .map(|&c| if *n > 0.0 { c / n } else { 0.0 })
                    .collect();
                let value = argmax(&distribution) as f64;
                TreeNode::Leaf { value, distribution, n_samples }
            }
            SideStats::Moments { sum, n, .. } => TreeNode::Leaf {
                value: if *n > 0.0 { sum / n } else { 0.0 },
                distribution: Vec::new(),
                n_samples,
            },
        }
    }

    fn leaf_for<'a>(node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a TreeNode {
        let mut node = node;
        loop {
            match node {
                TreeNode::Leaf { .. } => return node,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(DatalabError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(DatalabError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Predicted class index (classification) or value (regression)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.check_input(x)?;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| match Self::leaf_for(root, row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect())
    }

    /// Leaf class proportions, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(DatalabError::InvalidInput(
                "predict_proba is only available for classification".to_string(),
            ));
        }
        let root = self.check_input(x)?;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = Self::leaf_for(root, row) {
                for (j, p) in distribution.iter().enumerate() {
                    proba[[i, j]] = *p;
                }
            }
        }
        Ok(proba)
    }

    /// Normalised impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }
}

/// Index of the largest value; the first one on ties
pub(crate) fn argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> usize {
    values
        .into_iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}
