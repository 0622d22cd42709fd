//! Per-session log of training runs
//!
//! Stored as a pretty-printed JSON array; records are only ever appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::TrainingReport;
use crate::error::Result;

/// Metric triple kept for every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub accuracy: f64,
    pub f1_score: f64,
    pub auc_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunRecord {
    pub timestamp: DateTime<Utc>,
    pub model_type: String,
    pub params: serde_json::Value,
    pub target: String,
    pub metrics: RunMetrics,
}

impl TrainingRunRecord {
    pub fn from_report(report: &TrainingReport) -> Self {
        Self {
            timestamp: Utc::now(),
            model_type: report.model_type.clone(),
            params: report.params.clone(),
            target: report.target.clone(),
            metrics: RunMetrics {
                accuracy: report.accuracy,
                f1_score: report.f1_score,
                auc_score: report.auc_score,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingHistory {
    records: Vec<TrainingRunRecord>,
}

impl TrainingHistory {
    /// Parse a stored log; `None` starts an empty one
    pub fn from_bytes(bytes: Option<&[u8]>) -> Result<Self> {
        match bytes {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(serde_json::from_slice(bytes)?)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn push(&mut self, record: TrainingRunRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TrainingRunRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(model_type: &str, accuracy: f64) -> TrainingRunRecord {
        TrainingRunRecord {
            timestamp: Utc::now(),
            model_type: model_type.to_string(),
            params: json!({"n_estimators": 100}),
            target: "Potability".to_string(),
            metrics: RunMetrics {
                accuracy,
                f1_score: accuracy,
                auc_score: None,
            },
        }
    }

    #[test]
    fn test_empty_history() {
        assert!(TrainingHistory::from_bytes(None).unwrap().is_empty());
        assert!(TrainingHistory::from_bytes(Some(b"  \n")).unwrap().is_empty());
        assert!(TrainingHistory::from_bytes(Some(b"{not json")).is_err());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut history = TrainingHistory::default();
        history.push(record("Random Forest", 0.7));
        history.push(record("Logistic Regression", 0.6));

        let bytes = history.to_bytes().unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(stored.is_array());
        assert_eq!(stored[1]["model_type"], "Logistic Regression");
        assert!(stored[0]["metrics"]["auc_score"].is_null());

        let mut reloaded = TrainingHistory::from_bytes(Some(&bytes)).unwrap();
        reloaded.push(record("Gradient Boosting", 0.8));
        let names: Vec<&str> = reloaded.records().iter().map(|r| r.model_type.as_str()).collect();
        assert_eq!(names, ["Random Forest", "Logistic Regression", "Gradient Boosting"]);
    }
}
