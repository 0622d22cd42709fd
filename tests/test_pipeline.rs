//! Integration test: a full session through `DataLab` without HTTP

use datalab::imputation::{ImputeStrategy, StrategyMap};
use datalab::prelude::*;
use datalab::training::ModelArtifact;

fn lab() -> (tempfile::TempDir, DataLab) {
    let dir = tempfile::tempdir().unwrap();
    let lab = DataLab::open(dir.path()).unwrap();
    (dir, lab)
}

fn csv_with_gaps() -> Vec<u8> {
    let mut csv = String::from("Sulfate,Turbidity,Potability\n");
    for i in 0..80 {
        let label = i % 2;
        let sulfate = if i % 8 == 5 {
            String::new()
        } else {
            format!("{:.1}", 300.0 + label as f64 * 60.0 + (i % 5) as f64)
        };
        let turbidity = if i == 40 { "25.0".to_string() } else { format!("{:.2}", 3.5 + (i % 4) as f64 * 0.1) };
        csv.push_str(&format!("{},{},{}\n", sulfate, turbidity, label));
    }
    csv.into_bytes()
}

#[test]
fn test_session_lifecycle() {
    let (_dir, lab) = lab();
    let upload = lab.upload("water.csv", &csv_with_gaps()).unwrap();
    let id = upload.session_id.as_str();
    assert_eq!(upload.columns, vec!["Sulfate", "Turbidity", "Potability"]);

    let eda = lab.eda(id).unwrap();
    assert_eq!(eda.total_rows, 80);
    assert_eq!(eda.null_counts["Sulfate"], 10);
    let turbidity = eda
        .boxplots
        .iter()
        .find(|b| b.column == "Turbidity")
        .unwrap();
    assert_eq!(turbidity.outliers, 1);

    assert!(matches!(lab.compare(id), Err(DatalabError::NotFound(_))));

    let mut strategies = StrategyMap::new();
    strategies.insert("Sulfate".to_string(), ImputeStrategy::DropRow);
    let cleaned = lab.impute(id, strategies).unwrap();
    assert_eq!(cleaned.rows, 70);
    assert_eq!(cleaned.remaining_nulls["Sulfate"], 0);

    // training prefers the cleaned artifact
    let first = lab.train(id, &TrainingConfig::default()).unwrap();
    assert_eq!(first.report.train_size + first.report.test_size, 70);
    assert_eq!(first.history.len(), 1);

    let second = lab
        .train(id, &TrainingConfig::new(ModelFamily::GradientBoosting))
        .unwrap();
    assert_eq!(second.history.len(), 2);
    assert_eq!(second.history[1].model_type, "Gradient Boosting");
    assert_eq!(lab.history(id).unwrap().len(), 2);

    let download = lab.download_model(id).unwrap();
    assert_eq!(download.file_name, "trained_model.bin");
    let artifact = ModelArtifact::from_bytes(&download.bytes).unwrap();
    assert_eq!(artifact.family, ModelFamily::GradientBoosting);
    assert_eq!(artifact.target, "Potability");
}

#[test]
fn test_failed_training_leaves_session_untouched() {
    let (_dir, lab) = lab();
    let upload = lab
        .upload("one_class.csv", b"a,b,Potability\n1,2,0\n3,4,0\n5,6,0\n")
        .unwrap();
    let id = upload.session_id.as_str();

    let err = lab.train(id, &TrainingConfig::default()).unwrap_err();
    assert!(matches!(err, DatalabError::TrainingFailed(_)));
    assert!(lab.history(id).unwrap().is_empty());
    assert!(matches!(lab.download_model(id), Err(DatalabError::NotFound(_))));
}

#[test]
fn test_sessions_are_isolated() {
    let (_dir, lab) = lab();
    let a = lab.use_sample().unwrap().session_id;
    let b = lab.upload("water.csv", &csv_with_gaps()).unwrap().session_id;
    assert_ne!(a, b);

    let mut strategies = StrategyMap::new();
    strategies.insert("Sulfate".to_string(), ImputeStrategy::Mean);
    lab.impute(&b, strategies).unwrap();

    assert!(lab.compare(&b).is_ok());
    assert!(matches!(lab.compare(&a), Err(DatalabError::NotFound(_))));
    assert_eq!(lab.eda(&a).unwrap().total_rows, 3276);
}

#[test]
fn test_history_write_failure_keeps_previous_model() {
    let (_dir, lab) = lab();
    let id = lab.upload("water.csv", &csv_with_gaps()).unwrap().session_id;
    let session = SessionId::parse(&id).unwrap();

    lab.train(&id, &TrainingConfig::default()).unwrap();
    let first_model = lab.download_model(&id).unwrap().bytes;

    // replace the history file with a non-empty directory so it cannot be written
    let history = lab.store().root().join(lab.store().file_name(&session, ArtifactRole::History));
    std::fs::remove_file(&history).unwrap();
    std::fs::create_dir(&history).unwrap();
    std::fs::write(history.join("blocker"), b"x").unwrap();

    let result = lab.train(&id, &TrainingConfig::new(ModelFamily::LogisticRegression));
    assert!(result.is_err());
    assert_eq!(lab.download_model(&id).unwrap().bytes, first_model);
}

#[test]
fn test_history_write_failure_leaves_no_model() {
    let (_dir, lab) = lab();
    let id = lab.upload("water.csv", &csv_with_gaps()).unwrap().session_id;
    let session = SessionId::parse(&id).unwrap();

    let history = lab.store().root().join(lab.store().file_name(&session, ArtifactRole::History));
    std::fs::create_dir(&history).unwrap();
    std::fs::write(history.join("blocker"), b"x").unwrap();

    assert!(lab.train(&id, &TrainingConfig::default()).is_err());
    assert!(!lab.store().exists(&session, ArtifactRole::Model));
}
