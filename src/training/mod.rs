//! Model training module
//!
//! Classifier families selectable per run:
//! - Random Forest (native multiclass)
//! - Gradient Boosting (log-loss, one-vs-rest above two classes)
//! - Logistic Regression (L2, one-vs-rest above two classes)
//!
//! [`TrainEngine`] resolves the target, splits 80/20 with a fixed seed, fits
//! the selected family and evaluates it; [`history`] keeps the per-session
//! run log.

mod config;
mod engine;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod history;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;

pub use config::{HyperParams, ModelFamily, TrainingConfig, LOGISTIC_MAX_ITER, MAX_ESTIMATORS};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{
    train_test_split, FeatureImportance, ModelArtifact, PreparedData, TrainEngine, TrainedModel,
    TrainingOutcome, TrainingReport, RANDOM_STATE, TEST_FRACTION, TOP_FEATURES,
};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use history::{RunMetrics, TrainingHistory, TrainingRunRecord};
pub use linear_models::LogisticRegression;
pub use metrics::{RocPoint, ThresholdPoint};
pub use random_forest::{MaxFeatures, RandomForest};
