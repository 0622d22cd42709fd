//! Training engine: target resolution, split, fit, evaluation

use std::collections::BTreeSet;
use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::{HyperParams, ModelFamily, TrainingConfig};
use super::decision_tree::argmax;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::metrics::{self, RocPoint, ThresholdPoint};
use super::random_forest::RandomForest;
use crate::data::{format_number, ColumnValues, Dataset};
use crate::error::{DatalabError, Result};

/// Share of rows held out for evaluation
pub const TEST_FRACTION: f64 = 0.2;
/// Seed for the split and for every model family
pub const RANDOM_STATE: u64 = 42;
/// Number of features reported in `feature_importance`
pub const TOP_FEATURES: usize = 10;

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
}

impl TrainedModel {
    /// Fit the family selected by `params` on class indices
    pub fn fit(params: &HyperParams, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let model = match *params {
            HyperParams::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
            } => {
                let mut model = RandomForest::new_classifier(n_estimators)
                    .with_max_depth(max_depth)
                    .with_min_samples_split(min_samples_split)
                    .with_min_samples_leaf(min_samples_leaf)
                    .with_random_state(RANDOM_STATE);
                model.fit(x, y)?;
                TrainedModel::RandomForest(model)
            }
            HyperParams::GradientBoosting {
                n_estimators,
                learning_rate,
                max_depth,
                subsample,
            } => {
                let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators,
                    learning_rate,
                    max_depth,
                    subsample,
                    random_state: Some(RANDOM_STATE),
                    ..Default::default()
                });
                model.fit(x, y)?;
                TrainedModel::GradientBoosting(model)
            }
            HyperParams::LogisticRegression { c, max_iter } => {
                let mut model = LogisticRegression::new().with_c(c).with_max_iter(max_iter);
                model.fit(x, y)?;
                TrainedModel::LogisticRegression(model)
            }
        };
        Ok(model)
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedModel::RandomForest(_) => ModelFamily::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            TrainedModel::LogisticRegression(_) => ModelFamily::LogisticRegression,
        }
    }

    /// Class probabilities padded to `n_classes` columns
    pub fn predict_proba(&self, x: &Array2<f64>, n_classes: usize) -> Result<Array2<f64>> {
        let proba = match self {
            TrainedModel::RandomForest(m) => m.predict_proba(x)?,
            TrainedModel::GradientBoosting(m) => m.predict_proba(x)?,
            TrainedModel::LogisticRegression(m) => m.predict_proba(x)?,
        };
        if proba.ncols() >= n_classes {
            return Ok(proba);
        }
        // classes above the training maximum were never seen
        let mut padded = Array2::zeros((proba.nrows(), n_classes));
        padded
            .slice_mut(ndarray::s![.., ..proba.ncols()])
            .assign(&proba);
        Ok(padded)
    }

    /// Tree importances, or mean absolute standardized coefficients
    pub fn feature_importances(&self, n_features: usize) -> Vec<f64> {
        let importances = match self {
            TrainedModel::RandomForest(m) => m.feature_importances().map(|a| a.to_vec()),
            TrainedModel::GradientBoosting(m) => Some(m.feature_importances().to_vec()),
            TrainedModel::LogisticRegression(m) => m.feature_importances().map(|a| a.to_vec()),
        };
        importances.unwrap_or_else(|| vec![0.0; n_features])
    }
}

/// Persisted model plus what is needed to use it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub family: ModelFamily,
    pub params: HyperParams,
    pub target: String,
    pub feature_names: Vec<String>,
    pub class_labels: Vec<String>,
    pub model: TrainedModel,
    /// RFC 3339 timestamp
    pub trained_at: String,
}

impl ModelArtifact {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Predicted class labels for rows of `x` (features in training order)
    pub fn predict_labels(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        let proba = self.model.predict_proba(x, self.class_labels.len())?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| self.class_labels[argmax(row.iter())].clone())
            .collect())
    }
}

/// Numeric design matrix and encoded labels
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub target: String,
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    /// Class index per row
    pub labels: Array1<f64>,
    /// Sorted distinct target values, indexed by class
    pub class_labels: Vec<String>,
}

impl PreparedData {
    /// Resolve the target, drop rows without a label, encode classes and
    /// fill missing feature values with the column mean.
    pub fn from_dataset(dataset: &Dataset, target: Option<&str>) -> Result<Self> {
        let target_name = match target {
            Some(name) => name,
            None => dataset
                .default_target()
                .ok_or_else(|| DatalabError::TrainingFailed("Dataset has no columns".into()))?,
        };
        let target_col = dataset.column(target_name).ok_or_else(|| {
            DatalabError::InvalidInput(format!("Target column '{}' not found", target_name))
        })?;
        let target = target_col.name();

        let rows: Vec<usize> = (0..dataset.n_rows())
            .filter(|&i| !target_col.is_null(i))
            .collect();
        let dropped = dataset.n_rows() - rows.len();
        if dropped > 0 {
            warn!(target = %target, dropped, "Dropping rows with a missing target value");
        }

        let (class_labels, labels) = encode_classes(target, target_col.values(), &rows)?;
        if class_labels.len() < 2 {
            return Err(DatalabError::TrainingFailed(format!(
                "Target column '{}' needs at least two classes, found {}",
                target,
                class_labels.len()
            )));
        }

        let mut feature_names = Vec::new();
        let mut feature_values = Vec::new();
        for col in dataset.columns().iter().filter(|c| c.name() != target) {
            let values = col.as_f64().ok_or_else(|| {
                DatalabError::TrainingFailed(format!(
                    "Feature column '{}' is not numeric",
                    col.name()
                ))
            })?;
            let observed: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
            let mean = crate::stats::mean(&observed).ok_or_else(|| {
                DatalabError::TrainingFailed(format!(
                    "Feature column '{}' has no values",
                    col.name()
                ))
            })?;
            feature_names.push(col.name().to_string());
            feature_values.push(rows.iter().map(|&i| values[i].unwrap_or(mean)).collect::<Vec<_>>());
        }
        if feature_names.is_empty() {
            return Err(DatalabError::TrainingFailed(
                "Dataset has no feature columns besides the target".into(),
            ));
        }

        let features = Array2::from_shape_fn((rows.len(), feature_values.len()), |(i, j)| {
            feature_values[j][i]
        });

        Ok(Self {
            target: target.to_string(),
            feature_names,
            features,
            labels,
            class_labels,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_classes(&self) -> usize {
        self.class_labels.len()
    }
}

/// Map target values to class indices over sorted distinct values
fn encode_classes(
    target: &str,
    values: &ColumnValues,
    rows: &[usize],
) -> Result<(Vec<String>, Array1<f64>)> {
    match values {
        ColumnValues::Numeric { values, integral } => {
            let present: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
            if present.iter().any(|v| v.fract() != 0.0) {
                return Err(DatalabError::TrainingFailed(format!(
                    "Unknown label type: target column '{}' is continuous",
                    target
                )));
            }
            let mut classes = present.clone();
            classes.sort_by(f64::total_cmp);
            classes.dedup();
            let labels = present
                .iter()
                .map(|v| classes.partition_point(|c| c < v) as f64)
                .collect();
            let names = classes.iter().map(|&c| format_number(c, *integral)).collect();
            Ok((names, labels))
        }
        ColumnValues::Categorical(values) => {
            let present: Vec<&str> = rows.iter().filter_map(|&i| values[i].as_deref()).collect();
            let classes: Vec<&str> = present.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
            let labels = present
                .iter()
                .map(|v| classes.partition_point(|c| c < v) as f64)
                .collect();
            Ok((classes.into_iter().map(String::from).collect(), labels))
        }
    }
}

/// Seeded shuffle; the first `ceil(test_fraction * n)` rows are the test split.
/// Returns `(train, test)` row indices.
pub fn train_test_split(n_samples: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if n_samples < 2 {
        return Err(DatalabError::TrainingFailed(format!(
            "Need at least 2 labelled rows to split, got {}",
            n_samples
        )));
    }
    // tolerance keeps 0.2 * 1000 from rounding up to 201
    let n_test = ((n_samples as f64) * test_fraction - 1e-9)
        .ceil()
        .clamp(1.0, (n_samples - 1) as f64) as usize;

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Evaluation payload of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub target: String,
    pub model_type: String,
    pub params: serde_json::Value,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Binary targets with both classes in the test split only
    pub auc_score: Option<f64>,
    /// `[actual][predicted]`, ordered like `class_labels`
    pub confusion_matrix: Vec<Vec<usize>>,
    pub class_labels: Vec<String>,
    pub roc_curve: Vec<RocPoint>,
    pub threshold_analysis: Vec<ThresholdPoint>,
    pub feature_importance: Vec<FeatureImportance>,
    pub train_size: usize,
    pub test_size: usize,
    pub training_time_secs: f64,
}

/// Report plus the artifact to persist
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub artifact: ModelArtifact,
}

/// Main training engine
#[derive(Debug, Clone, Default)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit on an 80/20 split of `dataset` and evaluate on the held-out rows.
    /// Every failure is reported as `TrainingFailed`, except a missing
    /// explicit target or malformed hyperparameters (`InvalidInput`).
    pub fn run(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        let params = self.config.resolve()?;
        let data = PreparedData::from_dataset(dataset, self.config.target_column.as_deref())?;
        self.run_prepared(&data, params)
            .map_err(DatalabError::into_training_failure)
    }

    fn run_prepared(&self, data: &PreparedData, params: HyperParams) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let family = params.family();

        let (train_idx, test_idx) = train_test_split(data.n_samples(), TEST_FRACTION, RANDOM_STATE)?;
        let x_train = data.features.select(Axis(0), &train_idx);
        let y_train = data.labels.select(Axis(0), &train_idx);
        let x_test = data.features.select(Axis(0), &test_idx);
        let y_test: Vec<usize> = test_idx.iter().map(|&i| data.labels[i] as usize).collect();

        let train_classes: BTreeSet<usize> = y_train.iter().map(|&v| v as usize).collect();
        if train_classes.len() < 2 {
            return Err(DatalabError::TrainingFailed(
                "The training split contains only one class".into(),
            ));
        }

        info!(
            model_type = %family,
            target = %data.target,
            train_rows = train_idx.len(),
            test_rows = test_idx.len(),
            features = data.feature_names.len(),
            "Training model"
        );

        let model = TrainedModel::fit(&params, &x_train, &y_train)?;

        let n_classes = data.n_classes();
        let proba = model.predict_proba(&x_test, n_classes)?;
        let y_pred: Vec<usize> = proba.rows().into_iter().map(|row| argmax(row.iter())).collect();

        let scores = metrics::weighted_scores(&y_test, &y_pred, n_classes);
        let (auc_score, roc_curve, threshold_analysis) = if n_classes == 2 {
            let truth: Vec<bool> = y_test.iter().map(|&c| c == 1).collect();
            let positive: Vec<f64> = proba.column(1).to_vec();
            let curve = metrics::roc_curve(&truth, &positive);
            (
                metrics::roc_auc(&truth, &positive),
                metrics::downsample(&curve, metrics::ROC_POINTS),
                metrics::threshold_sweep(&truth, &positive),
            )
        } else {
            (None, Vec::new(), Vec::new())
        };

        let mut feature_importance: Vec<FeatureImportance> = data
            .feature_names
            .iter()
            .zip(model.feature_importances(data.feature_names.len()))
            .map(|(name, importance)| FeatureImportance {
                feature: name.clone(),
                importance,
            })
            .collect();
        feature_importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        feature_importance.truncate(TOP_FEATURES);

        let elapsed = start.elapsed();
        let report = TrainingReport {
            target: data.target.clone(),
            model_type: family.display_name().to_string(),
            params: params.to_json(),
            accuracy: metrics::accuracy(&y_test, &y_pred),
            precision: scores.precision,
            recall: scores.recall,
            f1_score: scores.f1,
            auc_score,
            confusion_matrix: metrics::confusion_matrix(&y_test, &y_pred, n_classes),
            class_labels: data.class_labels.clone(),
            roc_curve,
            threshold_analysis,
            feature_importance,
            train_size: train_idx.len(),
            test_size: test_idx.len(),
            training_time_secs: elapsed.as_secs_f64(),
        };

        info!(
            model_type = %family,
            accuracy = report.accuracy,
            f1_score = report.f1_score,
            elapsed_ms = elapsed.as_millis() as u64,
            "Training complete"
        );

        let artifact = ModelArtifact {
            family,
            params,
            target: data.target.clone(),
            feature_names: data.feature_names.clone(),
            class_labels: data.class_labels.clone(),
            model,
            trained_at: chrono::Utc::now().to_rfc3339(),
        };

        Ok(TrainingOutcome { report, artifact })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn separable(n: usize) -> Dataset {
        let x1: Vec<Option<f64>> = (0..n).map(|i| Some(i as f64)).collect();
        let x2: Vec<Option<f64>> = (0..n)
            .map(|i| if i % 7 == 0 { None } else { Some(((i * 31) % 17) as f64) })
            .collect();
        let label: Vec<Option<i64>> = (0..n).map(|i| Some((i >= n / 2) as i64)).collect();
        Dataset::new(vec![
            Column::numeric("x1", x1),
            Column::numeric("x2", x2),
            Column::integer("label", label),
        ])
        .unwrap()
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let (train, test) = train_test_split(1000, TEST_FRACTION, RANDOM_STATE).unwrap();
        assert_eq!(test.len(), 200);
        assert_eq!(train.len(), 800);
        let again = train_test_split(1000, TEST_FRACTION, RANDOM_STATE).unwrap();
        assert_eq!(again.1, test);

        let (train, test) = train_test_split(11, TEST_FRACTION, RANDOM_STATE).unwrap();
        assert_eq!((train.len(), test.len()), (8, 3));
        assert!(train_test_split(1, TEST_FRACTION, RANDOM_STATE).is_err());
    }

    #[test]
    fn test_prepared_data_fills_and_encodes() {
        let data = PreparedData::from_dataset(&separable(50), None).unwrap();
        assert_eq!(data.target, "label");
        assert_eq!(data.feature_names, vec!["x1", "x2"]);
        assert_eq!(data.class_labels, vec!["0", "1"]);
        assert!(data.features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_prepared_data_errors() {
        let ds = separable(20);
        assert!(matches!(
            PreparedData::from_dataset(&ds, Some("missing")),
            Err(DatalabError::InvalidInput(_))
        ));

        let single = Dataset::new(vec![
            Column::numeric("x", vec![Some(1.0), Some(2.0)]),
            Column::integer("y", vec![Some(1), Some(1)]),
        ])
        .unwrap();
        assert!(matches!(
            PreparedData::from_dataset(&single, None),
            Err(DatalabError::TrainingFailed(_))
        ));

        let text_feature = Dataset::new(vec![
            Column::categorical("city", vec![Some("a".into()), Some("b".into())]),
            Column::integer("y", vec![Some(0), Some(1)]),
        ])
        .unwrap();
        assert!(matches!(
            PreparedData::from_dataset(&text_feature, None),
            Err(DatalabError::TrainingFailed(_))
        ));
    }

    #[test]
    fn test_categorical_target_labels_are_sorted() {
        let ds = Dataset::new(vec![
            Column::numeric("x", (0..6).map(|i| Some(i as f64)).collect()),
            Column::categorical(
                "kind",
                ["b", "a", "b", "a", "b", "a"].iter().map(|s| Some(s.to_string())).collect(),
            ),
        ])
        .unwrap();
        let data = PreparedData::from_dataset(&ds, None).unwrap();
        assert_eq!(data.class_labels, vec!["a", "b"]);
        assert_eq!(data.labels[0], 1.0);
        assert_eq!(data.labels[1], 0.0);
    }

    #[test]
    fn test_engine_run_each_family() {
        let ds = separable(200);
        for family in ModelFamily::ALL {
            let config = TrainingConfig::new(family).with_param("n_estimators", 20);
            let outcome = TrainEngine::new(config).run(&ds).unwrap();
            let report = &outcome.report;
            assert_eq!(report.model_type, family.display_name());
            assert_eq!(report.test_size, 40);
            assert_eq!(report.threshold_analysis.len(), 21);
            let total: usize = report.confusion_matrix.iter().flatten().sum();
            assert_eq!(total, 40);
            assert!(report.accuracy > 0.8, "{} accuracy {}", family, report.accuracy);
            assert!(report.auc_score.is_some());
            assert!(report.roc_curve.len() <= metrics::ROC_POINTS);
            assert_eq!(report.feature_importance.len(), 2);
            assert_eq!(outcome.artifact.family, family);
        }
    }

    #[test]
    fn test_artifact_roundtrip_predicts() {
        let ds = separable(100);
        let outcome = TrainEngine::new(TrainingConfig::new(ModelFamily::LogisticRegression))
            .run(&ds)
            .unwrap();
        let bytes = outcome.artifact.to_bytes().unwrap();
        let restored = ModelArtifact::from_bytes(&bytes).unwrap();
        assert_eq!(restored.feature_names, vec!["x1", "x2"]);
        let labels = restored
            .predict_labels(&ndarray::array![[0.0, 3.0], [99.0, 3.0]])
            .unwrap();
        assert_eq!(labels, vec!["0", "1"]);
    }
}
