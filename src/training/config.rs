//! Training configuration: model family, hyperparameters and target choice

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{DatalabError, Result};

/// Supported classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    LogisticRegression,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::LogisticRegression,
    ];

    /// Name used in responses and history records
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "Random Forest",
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::LogisticRegression => "Logistic Regression",
        }
    }

    /// Case-, space- and underscore-insensitive lookup
    /// ("Random Forest", "random_forest", "RandomForest", "rf")
    pub fn parse_lenient(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "randomforest" | "rf" => Some(ModelFamily::RandomForest),
            "gradientboosting" | "gb" | "gbm" => Some(ModelFamily::GradientBoosting),
            "logisticregression" | "logistic" | "lr" => Some(ModelFamily::LogisticRegression),
            _ => None,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Iteration cap for logistic regression
pub const LOGISTIC_MAX_ITER: usize = 1000;

/// Largest accepted `n_estimators` for the tree ensembles
pub const MAX_ESTIMATORS: usize = 1000;

/// Resolved hyperparameters of one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HyperParams {
    RandomForest {
        n_estimators: usize,
        /// Unrestricted when `None`
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
    },
    GradientBoosting {
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
        subsample: f64,
    },
    LogisticRegression {
        c: f64,
        max_iter: usize,
    },
}

impl HyperParams {
    pub fn defaults(family: ModelFamily) -> Self {
        match family {
            ModelFamily::RandomForest => HyperParams::RandomForest {
                n_estimators: 100,
                max_depth: None,
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
            ModelFamily::GradientBoosting => HyperParams::GradientBoosting {
                n_estimators: 100,
                learning_rate: 0.1,
                max_depth: 3,
                subsample: 1.0,
            },
            ModelFamily::LogisticRegression => HyperParams::LogisticRegression {
                c: 1.0,
                max_iter: LOGISTIC_MAX_ITER,
            },
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            HyperParams::RandomForest { .. } => ModelFamily::RandomForest,
            HyperParams::GradientBoosting { .. } => ModelFamily::GradientBoosting,
            HyperParams::LogisticRegression { .. } => ModelFamily::LogisticRegression,
        }
    }

    /// Merge user-supplied values over the family defaults. Unknown keys are
    /// ignored; known keys with unusable values are rejected.
    pub fn merge(family: ModelFamily, overrides: &Map<String, Value>) -> Result<Self> {
        let mut params = Self::defaults(family);
        for (key, value) in overrides {
            match (&mut params, key.as_str()) {
                (
                    HyperParams::RandomForest { n_estimators, .. }
                    | HyperParams::GradientBoosting { n_estimators, .. },
                    "n_estimators",
                ) => {
                    let v = positive_int(key, value)?;
                    if v > MAX_ESTIMATORS {
                        return Err(invalid(key, value, &format!("must be at most {}", MAX_ESTIMATORS)));
                    }
                    *n_estimators = v;
                }
                (HyperParams::RandomForest { max_depth, .. }, "max_depth") => {
                    *max_depth = optional_depth(key, value)?
                }
                (HyperParams::RandomForest { min_samples_split, .. }, "min_samples_split") => {
                    *min_samples_split = positive_int(key, value)?.max(2)
                }
                (HyperParams::RandomForest { min_samples_leaf, .. }, "min_samples_leaf") => {
                    *min_samples_leaf = positive_int(key, value)?
                }
                (HyperParams::GradientBoosting { learning_rate, .. }, "learning_rate") => {
                    *learning_rate = positive_float(key, value)?
                }
                (HyperParams::GradientBoosting { max_depth, .. }, "max_depth") => {
                    *max_depth = positive_int(key, value)?
                }
                (HyperParams::GradientBoosting { subsample, .. }, "subsample") => {
                    let v = positive_float(key, value)?;
                    if v > 1.0 {
                        return Err(invalid(key, value, "must be in (0, 1]"));
                    }
                    *subsample = v;
                }
                (HyperParams::LogisticRegression { c, .. }, "C" | "c") => {
                    *c = positive_float(key, value)?
                }
                _ => debug!(param = %key, family = %family, "Ignoring unknown hyperparameter"),
            }
        }
        Ok(params)
    }

    /// JSON view with the public parameter names
    pub fn to_json(&self) -> Value {
        match self {
            HyperParams::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
            } => json!({
                "n_estimators": n_estimators,
                "max_depth": max_depth,
                "min_samples_split": min_samples_split,
                "min_samples_leaf": min_samples_leaf,
            }),
            HyperParams::GradientBoosting {
                n_estimators,
                learning_rate,
                max_depth,
                subsample,
            } => json!({
                "n_estimators": n_estimators,
                "learning_rate": learning_rate,
                "max_depth": max_depth,
                "subsample": subsample,
            }),
            HyperParams::LogisticRegression { c, max_iter } => json!({
                "C": c,
                "max_iter": max_iter,
            }),
        }
    }
}

fn invalid(key: &str, value: &Value, reason: &str) -> DatalabError {
    DatalabError::InvalidInput(format!(
        "Invalid value for hyperparameter '{}': {} ({})",
        key, value, reason
    ))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive_int(key: &str, value: &Value) -> Result<usize> {
    match as_number(value) {
        Some(v) if v >= 1.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as usize),
        _ => Err(invalid(key, value, "expected a positive integer")),
    }
}

fn positive_float(key: &str, value: &Value) -> Result<f64> {
    match as_number(value) {
        Some(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(invalid(key, value, "expected a positive number")),
    }
}

/// `null`, `"None"` or a positive integer
fn optional_depth(key: &str, value: &Value) -> Result<Option<usize>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if matches!(s.trim(), "None" | "none" | "null" | "") => Ok(None),
        _ => positive_int(key, value).map(Some),
    }
}

/// Body of a training request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Family name; Random Forest when absent
    #[serde(default)]
    pub model_type: Option<String>,
    /// Hyperparameter overrides
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Explicit label column; `Potability` or the last column when absent
    #[serde(default)]
    pub target_column: Option<String>,
}

impl TrainingConfig {
    pub fn new(family: ModelFamily) -> Self {
        Self {
            model_type: Some(family.display_name().to_string()),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = Some(target.into());
        self
    }

    /// Family plus merged hyperparameters. An unrecognised family name falls
    /// back to Random Forest defaults and the supplied params are dropped.
    ///
    /// A known parameter with an unusable value (non-numeric, out of range,
    /// `n_estimators` above [`MAX_ESTIMATORS`]) is rejected here as
    /// [`DatalabError::InvalidInput`], which the server maps to 400. Failures
    /// raised later while fitting surface as [`DatalabError::TrainingFailed`]
    /// and map to 500.
    pub fn resolve(&self) -> Result<HyperParams> {
        match self.model_type.as_deref() {
            None => HyperParams::merge(ModelFamily::RandomForest, &self.params),
            Some(name) => match ModelFamily::parse_lenient(name) {
                Some(family) => HyperParams::merge(family, &self.params),
                None => {
                    warn!(model_type = %name, "Unknown model family, using Random Forest defaults");
                    Ok(HyperParams::defaults(ModelFamily::RandomForest))
                }
            },
        }
    }
}
