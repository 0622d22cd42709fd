//! Gradient Boosting classifier
//!
//! Boosted regression trees on the log-loss gradient. Two classes use a single
//! booster; more classes train one booster per class (one-vs-rest) and
//! normalise their probabilities.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::{argmax, DecisionTree};
use crate::error::{DatalabError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio for each tree
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// One binary booster: positive class = 1.0 in `y`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryBooster {
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
}

impl BinaryBooster {
    fn fit(config: &GradientBoostingConfig, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        let initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut booster = Self {
            trees: Vec::with_capacity(config.n_estimators),
            col_indices_per_tree: Vec::with_capacity(config.n_estimators),
            initial_log_odds,
            feature_importances: vec![0.0; n_features],
        };

        for _ in 0..config.n_estimators {
            // negative gradient of the log loss
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, &lo)| yi - sigmoid(lo))
                .collect();

            let row_indices = sample_indices(n_samples, config.subsample, &mut rng);
            let col_indices = sample_indices(n_features, config.colsample_bytree, &mut rng);

            let x_sub = x.select(Axis(0), &row_indices).select(Axis(1), &col_indices);
            let y_sub: Array1<f64> = row_indices.iter().map(|&i| residuals[i]).collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(config.max_depth)
                .with_min_samples_leaf(config.min_samples_leaf);
            tree.fit(&x_sub, &y_sub)?;

            // every row moves, not only the sampled ones
            let step = tree.predict(&x.select(Axis(1), &col_indices))?;
            log_odds.scaled_add(config.learning_rate, &step);

            if let Some(tree_importance) = tree.feature_importances() {
                for (&col_idx, &imp) in col_indices.iter().zip(tree_importance.iter()) {
                    booster.feature_importances[col_idx] += imp;
                }
            }

            booster.trees.push(tree);
            booster.col_indices_per_tree.push(col_indices);
        }

        Ok(booster)
    }

    fn decision_function(&self, x: &Array2<f64>, learning_rate: f64) -> Result<Array1<f64>> {
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, col_indices) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let step = tree.predict(&x.select(Axis(1), col_indices))?;
            log_odds.scaled_add(learning_rate, &step);
        }
        Ok(log_odds)
    }
}

/// Sorted random subset of `0..n` of size `ceil(n * ratio)`
fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio >= 1.0 {
        return indices;
    }
    let sample_size = ((n as f64) * ratio).ceil().max(1.0) as usize;
    indices.shuffle(rng);
    indices.truncate(sample_size);
    indices.sort_unstable();
    indices
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    boosters: Vec<BinaryBooster>,
    n_classes: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            boosters: Vec::new(),
            n_classes: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit on class indices `0..k`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(DatalabError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(DatalabError::TrainingFailed(
                "Cannot fit gradient boosting on zero samples".to_string(),
            ));
        }

        self.n_classes = y.iter().fold(0.0f64, |m, &v| m.max(v)) as usize + 1;
        let seed = self.config.random_state.unwrap_or(42);

        self.boosters = if self.n_classes <= 2 {
            vec![BinaryBooster::fit(&self.config, x, y, seed)?]
        } else {
            (0..self.n_classes)
                .map(|class| {
                    let y_bin: Array1<f64> =
                        y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
                    BinaryBooster::fit(&self.config, x, &y_bin, seed.wrapping_add(class as u64))
                })
                .collect::<Result<_>>()?
        };

        let mut importances = vec![0.0; x.ncols()];
        for booster in &self.boosters {
            for (acc, imp) in importances.iter_mut().zip(&booster.feature_importances) {
                *acc += imp;
            }
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = importances;

        Ok(self)
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.boosters.is_empty() {
            return Err(DatalabError::ModelNotFitted);
        }
        let lr = self.config.learning_rate;

        if self.boosters.len() == 1 {
            let p = self.boosters[0].decision_function(x, lr)?.mapv(sigmoid);
            let mut proba = Array2::zeros((x.nrows(), 2));
            for (i, &pi) in p.iter().enumerate() {
                proba[[i, 0]] = 1.0 - pi;
                proba[[i, 1]] = pi;
            }
            return Ok(proba);
        }

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (class, booster) in self.boosters.iter().enumerate() {
            let p = booster.decision_function(x, lr)?.mapv(sigmoid);
            proba.column_mut(class).assign(&p);
        }
        for mut row in proba.rows_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            }
        }
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row.iter()) as f64).collect())
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}
