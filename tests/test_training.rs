//! Integration test: training engine over in-memory datasets

use datalab::data::{Column, Dataset};
use datalab::training::{
    HyperParams, ModelArtifact, ModelFamily, TrainEngine, TrainingConfig, TrainingReport,
};
use datalab::DatalabError;
use serde_json::json;

/// `n` rows, `n_classes` balanced labels; `signal` separates the classes,
/// `noise` does not
fn classification_dataset(n: usize, n_classes: usize) -> Dataset {
    let labels: Vec<i64> = (0..n).map(|i| (i % n_classes) as i64).collect();
    let signal = labels
        .iter()
        .enumerate()
        .map(|(i, &y)| Some(y as f64 * 4.0 + ((i * 7) % 13) as f64 / 13.0))
        .collect();
    let noise = (0..n).map(|i| Some(((i * 31) % 17) as f64)).collect();
    Dataset::new(vec![
        Column::numeric("signal", signal),
        Column::numeric("noise", noise),
        Column::integer("label", labels.into_iter().map(Some).collect()),
    ])
    .unwrap()
}

fn train(dataset: &Dataset, config: TrainingConfig) -> TrainingReport {
    TrainEngine::new(config).run(dataset).unwrap().report
}

#[test]
fn test_random_forest_defaults_on_binary_data() {
    let dataset = classification_dataset(1000, 2);
    let report = train(&dataset, TrainingConfig::default());

    assert_eq!(report.model_type, "Random Forest");
    assert_eq!(report.target, "label");
    assert_eq!((report.train_size, report.test_size), (800, 200));

    let total: usize = report.confusion_matrix.iter().flatten().sum();
    assert_eq!(total, 200);
    assert!(report.accuracy > 0.95, "accuracy {}", report.accuracy);

    assert_eq!(report.threshold_analysis.len(), 21);
    assert!(!report.roc_curve.is_empty());
    assert!(report.roc_curve.len() <= 21);
    assert!(report.auc_score.unwrap() > 0.95);

    assert_eq!(report.feature_importance[0].feature, "signal");
    assert_eq!(report.params["n_estimators"], 100);
    assert!(report.params["max_depth"].is_null());
}

#[test]
fn test_threshold_sweep_is_monotone() {
    let dataset = classification_dataset(300, 2);
    let report = train(&dataset, TrainingConfig::new(ModelFamily::LogisticRegression));

    let sweep = &report.threshold_analysis;
    assert_eq!(sweep.first().unwrap().threshold, 0.0);
    assert_eq!(sweep.last().unwrap().threshold, 1.0);
    assert_eq!(sweep[0].recall, 1.0);
    for pair in sweep.windows(2) {
        assert!(pair[1].recall <= pair[0].recall + 1e-12);
    }
}

#[test]
fn test_multiclass_has_no_curves() {
    let dataset = classification_dataset(300, 3);
    for family in ModelFamily::ALL {
        let report = train(&dataset, TrainingConfig::new(family));
        assert_eq!(report.class_labels, vec!["0", "1", "2"], "{}", family);
        assert_eq!(report.confusion_matrix.len(), 3);
        assert!(report.auc_score.is_none());
        assert!(report.roc_curve.is_empty());
        assert!(report.threshold_analysis.is_empty());
        if family != ModelFamily::LogisticRegression {
            assert!(report.accuracy > 0.8, "{}: accuracy {}", family, report.accuracy);
        }
    }
}

#[test]
fn test_params_override_and_report() {
    let dataset = classification_dataset(200, 2);
    let config = TrainingConfig::new(ModelFamily::GradientBoosting)
        .with_param("n_estimators", json!("20"))
        .with_param("learning_rate", json!(0.2))
        .with_param("unknown", json!(1));
    let report = train(&dataset, config);

    assert_eq!(report.model_type, "Gradient Boosting");
    assert_eq!(report.params["n_estimators"], 20);
    assert_eq!(report.params["learning_rate"], 0.2);
    assert!(report.params.get("unknown").is_none());
}

#[test]
fn test_logistic_regression_with_tiny_c_and_collinear_features() {
    let base = classification_dataset(1000, 2);
    let signal = base.column("signal").unwrap().non_null_f64();
    let mut columns: Vec<Column> = (0..20)
        .map(|k| {
            Column::numeric(
                format!("signal_{}", k),
                signal.iter().map(|v| Some(v * (k + 1) as f64)).collect(),
            )
        })
        .collect();
    columns.push(base.column("label").unwrap().clone());
    let dataset = Dataset::new(columns).unwrap();

    for c in [1e-4, 1e-6] {
        let config = TrainingConfig::new(ModelFamily::LogisticRegression).with_param("C", c);
        let report = train(&dataset, config);
        assert!(
            report.feature_importance.iter().all(|f| f.importance.is_finite()),
            "C={}: {:?}",
            c,
            report.feature_importance
        );
        assert!(report.accuracy.is_finite());
        assert!(report.auc_score.unwrap() > 0.9, "C={}: auc {:?}", c, report.auc_score);
    }
}

#[test]
fn test_invalid_param_is_rejected() {
    let dataset = classification_dataset(100, 2);
    let config = TrainingConfig::new(ModelFamily::RandomForest)
        .with_param("n_estimators", json!("many"));
    let err = TrainEngine::new(config).run(&dataset).unwrap_err();
    assert!(matches!(err, DatalabError::InvalidInput(_)), "{:?}", err);
}

#[test]
fn test_unknown_family_falls_back_to_random_forest() {
    let dataset = classification_dataset(100, 2);
    let config = TrainingConfig {
        model_type: Some("Quantum Annealer".to_string()),
        ..Default::default()
    };
    let report = train(&dataset, config);
    assert_eq!(report.model_type, "Random Forest");
    assert_eq!(
        report.params,
        HyperParams::defaults(ModelFamily::RandomForest).to_json()
    );
}

#[test]
fn test_target_selection() {
    let dataset = classification_dataset(100, 2);

    let err = TrainEngine::new(TrainingConfig::default().with_target("missing"))
        .run(&dataset)
        .unwrap_err();
    assert!(matches!(err, DatalabError::InvalidInput(_)));

    // a continuous target cannot be used for classification
    let err = TrainEngine::new(TrainingConfig::default().with_target("signal"))
        .run(&dataset)
        .unwrap_err();
    assert!(matches!(err, DatalabError::TrainingFailed(_)), "{:?}", err);
}

#[test]
fn test_categorical_feature_fails_training() {
    let n = 40;
    let dataset = Dataset::new(vec![
        Column::categorical("colour", (0..n).map(|i| Some(format!("c{}", i % 3))).collect()),
        Column::integer("label", (0..n).map(|i| Some((i % 2) as i64)).collect()),
    ])
    .unwrap();
    let err = TrainEngine::new(TrainingConfig::default())
        .run(&dataset)
        .unwrap_err();
    assert!(matches!(err, DatalabError::TrainingFailed(_)));
}

#[test]
fn test_artifact_predicts_class_labels() {
    let dataset = classification_dataset(200, 2);
    let outcome = TrainEngine::new(TrainingConfig::default()).run(&dataset).unwrap();
    let artifact = ModelArtifact::from_bytes(&outcome.artifact.to_bytes().unwrap()).unwrap();

    assert_eq!(artifact.feature_names, vec!["signal", "noise"]);
    let x = ndarray::array![[0.2, 3.0], [4.3, 3.0]];
    assert_eq!(artifact.predict_labels(&x).unwrap(), vec!["0", "1"]);
}
