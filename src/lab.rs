//! Session-scoped operations
//!
//! [`DataLab`] is the boundary every caller goes through: each method
//! resolves its artifacts by session id, computes in memory and only then
//! writes. Nothing is cached between calls.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::comparison::{ComparisonEngine, ComparisonReport};
use crate::data::{self, Dataset, Preview};
use crate::error::{DatalabError, Result};
use crate::imputation::{Imputer, StrategyMap};
use crate::profiling::{DatasetProfiler, EdaReport};
use crate::session::{ArtifactRole, SessionId, SessionStore};
use crate::training::{
    TrainEngine, TrainingConfig, TrainingHistory, TrainingReport, TrainingRunRecord,
};

/// Rows validated on upload and shown by `preview`
pub const PREVIEW_ROWS: usize = 5;
/// File name offered for model downloads
pub const MODEL_DOWNLOAD_NAME: &str = "trained_model.bin";

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub filename: String,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImputeResponse {
    pub message: String,
    pub remaining_nulls: indexmap::IndexMap<String, usize>,
    pub cleaned_file: String,
    pub rows: usize,
}

/// Training metrics plus the session's run log so far
#[derive(Debug, Clone, Serialize)]
pub struct TrainResponse {
    #[serde(flatten)]
    pub report: TrainingReport,
    pub history: Vec<TrainingRunRecord>,
}

#[derive(Debug, Clone)]
pub struct ModelDownload {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

/// Data lab service over a working directory
#[derive(Debug, Clone)]
pub struct DataLab {
    store: SessionStore,
    sample_dataset: Option<PathBuf>,
}

impl DataLab {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            sample_dataset: None,
        }
    }

    /// Open the working directory, creating it if needed
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(SessionStore::open(data_dir)?))
    }

    /// Serve `use_sample` from a CSV file instead of the bundled generator
    pub fn with_sample_dataset(mut self, path: Option<PathBuf>) -> Self {
        self.sample_dataset = path;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn load(&self, id: &SessionId, role: ArtifactRole) -> Result<Dataset> {
        let bytes = self.store.read_artifact(id, role)?;
        data::read_csv(&bytes)
    }

    /// Validate the first rows of an uploaded CSV and store it as a new
    /// session's raw artifact
    pub fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadResponse> {
        if !filename.ends_with(".csv") {
            return Err(DatalabError::InvalidInput(
                "Only CSV files are allowed.".to_string(),
            ));
        }
        let head = data::read_csv_head(bytes, PREVIEW_ROWS)?;

        let id = self.store.create_session();
        self.store.write_artifact(&id, ArtifactRole::Raw, bytes)?;
        info!(session_id = %id, filename = %filename, bytes = bytes.len(), "Dataset uploaded");

        Ok(UploadResponse {
            session_id: id.to_string(),
            filename: filename.to_string(),
            columns: head.column_names(),
            rows: None,
        })
    }

    /// Copy the reference dataset into a new session
    pub fn use_sample(&self) -> Result<UploadResponse> {
        let (filename, bytes, dataset) = match &self.sample_dataset {
            Some(path) => {
                let bytes = std::fs::read(path)?;
                let dataset = data::read_csv(&bytes)?;
                (display_name(path), bytes, dataset)
            }
            None => {
                let dataset = data::sample::water_potability()?;
                let bytes = data::write_csv(&dataset)?;
                ("water_potability.csv".to_string(), bytes, dataset)
            }
        };

        let id = self.store.create_session();
        self.store.write_artifact(&id, ArtifactRole::Raw, &bytes)?;
        info!(session_id = %id, rows = dataset.n_rows(), "Sample dataset loaded");

        Ok(UploadResponse {
            session_id: id.to_string(),
            filename,
            columns: dataset.column_names(),
            rows: Some(dataset.n_rows()),
        })
    }

    pub fn eda(&self, session_id: &str) -> Result<EdaReport> {
        let id = SessionId::parse(session_id)?;
        let dataset = self.load(&id, ArtifactRole::Raw)?;
        let start = Instant::now();
        let report = DatasetProfiler.profile(&dataset);
        info!(
            session_id = %id,
            rows = dataset.n_rows(),
            columns = dataset.n_cols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Profiled dataset"
        );
        Ok(report)
    }

    pub fn preview(&self, session_id: &str) -> Result<Preview> {
        let id = SessionId::parse(session_id)?;
        let bytes = self.store.read_artifact(&id, ArtifactRole::Raw)?;
        Ok(data::read_csv_head(&bytes, PREVIEW_ROWS)?.preview(PREVIEW_ROWS))
    }

    /// Apply the strategies to the raw dataset and overwrite `cleaned`
    pub fn impute(&self, session_id: &str, strategies: StrategyMap) -> Result<ImputeResponse> {
        let id = SessionId::parse(session_id)?;
        let raw = self.load(&id, ArtifactRole::Raw)?;

        let outcome = Imputer::new(strategies).transform(raw);
        let bytes = data::write_csv(&outcome.dataset)?;
        self.store.write_artifact(&id, ArtifactRole::Cleaned, &bytes)?;
        info!(
            session_id = %id,
            rows = outcome.dataset.n_rows(),
            rows_dropped = outcome.rows_dropped,
            "Imputation applied"
        );

        Ok(ImputeResponse {
            message: "Imputation applied successfully".to_string(),
            remaining_nulls: outcome.remaining_nulls(),
            cleaned_file: self.store.file_name(&id, ArtifactRole::Cleaned),
            rows: outcome.dataset.n_rows(),
        })
    }

    pub fn compare(&self, session_id: &str) -> Result<ComparisonReport> {
        let id = SessionId::parse(session_id)?;
        let cleaned = self.load(&id, ArtifactRole::Cleaned)?;
        let raw = self.load(&id, ArtifactRole::Raw)?;
        Ok(ComparisonEngine.compare(&raw, &cleaned))
    }

    /// Train on `cleaned` (or `raw`), then persist model and history.
    /// Nothing is written unless training succeeds.
    pub fn train(&self, session_id: &str, config: &TrainingConfig) -> Result<TrainResponse> {
        let id = SessionId::parse(session_id)?;
        let role = if self.store.exists(&id, ArtifactRole::Cleaned) {
            ArtifactRole::Cleaned
        } else if self.store.exists(&id, ArtifactRole::Raw) {
            ArtifactRole::Raw
        } else {
            return Err(DatalabError::NotFound("Dataset not found".to_string()));
        };
        let dataset = self.load(&id, role)?;

        let outcome = TrainEngine::new(config.clone()).run(&dataset)?;
        let model_bytes = outcome.artifact.to_bytes()?;

        let mut history =
            TrainingHistory::from_bytes(self.store.read_optional(&id, ArtifactRole::History)?.as_deref())?;
        history.push(TrainingRunRecord::from_report(&outcome.report));
        let history_bytes = history.to_bytes()?;

        self.store.write_artifacts(
            &id,
            &[
                (ArtifactRole::Model, model_bytes.as_slice()),
                (ArtifactRole::History, history_bytes.as_slice()),
            ],
        )?;
        info!(
            session_id = %id,
            source = %role,
            model_type = %outcome.report.model_type,
            runs = history.len(),
            "Model trained and saved"
        );

        Ok(TrainResponse {
            report: outcome.report,
            history: history.records().to_vec(),
        })
    }

    /// Stored run log, empty before the first training
    pub fn history(&self, session_id: &str) -> Result<TrainingHistory> {
        let id = SessionId::parse(session_id)?;
        if !self.store.exists(&id, ArtifactRole::Raw) {
            return Err(DatalabError::NotFound(ArtifactRole::Raw.missing_message().to_string()));
        }
        TrainingHistory::from_bytes(self.store.read_optional(&id, ArtifactRole::History)?.as_deref())
    }

    pub fn download_model(&self, session_id: &str) -> Result<ModelDownload> {
        let id = SessionId::parse(session_id)?;
        Ok(ModelDownload {
            file_name: MODEL_DOWNLOAD_NAME,
            bytes: self.store.read_artifact(&id, ArtifactRole::Model)?,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample.csv".to_string())
}
