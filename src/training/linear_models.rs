//! Linear model implementations

use crate::error::{DatalabError, Result};
use super::decision_tree::argmax;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// One binary logistic model in standardized feature space
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryLogit {
    weights: Array1<f64>,
    bias: f64,
}

/// Logistic regression with L2 penalty
///
/// Features are standardized internally, so coefficients are comparable
/// across features. More than two classes are handled one-vs-rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    means: Array1<f64>,
    scales: Array1<f64>,
    models: Vec<BinaryLogit>,
    n_classes: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            means: Array1::zeros(0),
            scales: Array1::zeros(0),
            models: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.models.is_empty()
    }

    fn standardize(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.means) / &self.scales
    }

    /// Fit on class indices `0..k` using preconditioned gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(DatalabError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(DatalabError::TrainingFailed(
                "Cannot fit logistic regression on zero samples".to_string(),
            ));
        }
        if !(self.c > 0.0) {
            return Err(DatalabError::InvalidInput(format!(
                "C must be positive, got {}",
                self.c
            )));
        }

        self.means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        self.scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = self.standardize(x);

        self.n_classes = y.iter().fold(0.0f64, |m, &v| m.max(v)) as usize + 1;
        let models = if self.n_classes <= 2 {
            vec![self.fit_binary(&xs, y)]
        } else {
            (0..self.n_classes)
                .map(|class| {
                    let y_bin = y.mapv(|v| if v as usize == class { 1.0 } else { 0.0 });
                    self.fit_binary(&xs, &y_bin)
                })
                .collect()
        };

        let diverged = models
            .iter()
            .any(|m| !m.bias.is_finite() || m.weights.iter().any(|w| !w.is_finite()));
        if diverged {
            return Err(DatalabError::TrainingFailed(format!(
                "Logistic regression diverged (C = {})",
                self.c
            )));
        }
        self.models = models;

        Ok(self)
    }

    fn fit_binary(&self, xs: &Array2<f64>, y: &Array1<f64>) -> BinaryLogit {
        let n = xs.nrows() as f64;
        let mut weights = Array1::zeros(xs.ncols());
        let mut bias = 0.0;
        // objective: 0.5 |w|² + C * Σ logloss, scaled by 1 / (C n)
        let penalty = 1.0 / (self.c * n);

        // The logloss Hessian is bounded by ‖[X 1]‖_F² / (4n) times the
        // identity; adding the penalty on w gives a diagonal majorizer, so
        // the steps below never overshoot however small C is.
        let data_bound = 0.25 * (xs.mapv(|v| v * v).sum() / n + 1.0);
        let step_w = 1.0 / (data_bound + penalty);
        let step_b = 1.0 / data_bound;

        for _ in 0..self.max_iter {
            let predictions = sigmoid(&(xs.dot(&weights) + bias));
            let errors = &predictions - y;
            let dw = xs.t().dot(&errors) / n + &weights * penalty;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !(grad_norm >= self.tol) {
                break;
            }

            weights.scaled_add(-step_w, &dw);
            bias -= step_b * db;
        }

        BinaryLogit { weights, bias }
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(DatalabError::ModelNotFitted);
        }
        if x.ncols() != self.means.len() {
            return Err(DatalabError::ShapeError {
                expected: format!("{} features", self.means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let xs = self.standardize(x);

        if self.models.len() == 1 {
            let m = &self.models[0];
            let p = sigmoid(&(xs.dot(&m.weights) + m.bias));
            let mut proba = Array2::zeros((x.nrows(), 2));
            proba.column_mut(0).assign(&p.mapv(|v| 1.0 - v));
            proba.column_mut(1).assign(&p);
            return Ok(proba);
        }

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (class, m) in self.models.iter().enumerate() {
            proba
                .column_mut(class)
                .assign(&sigmoid(&(xs.dot(&m.weights) + m.bias)));
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

    /// Coefficients on the standardized scale, one row per binary model
    pub fn coefficients(&self) -> Option<Array2<f64>> {
        let first = self.models.first()?;
        let mut coef = Array2::zeros((self.models.len(), first.weights.len()));
        for (i, m) in self.models.iter().enumerate() {
            coef.row_mut(i).assign(&m.weights);
        }
        Some(coef)
    }

    /// Mean absolute coefficient per feature
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.coefficients()?.mapv(f64::abs).mean_axis(Axis(0))
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}
