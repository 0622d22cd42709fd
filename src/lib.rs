//! Data lab - session-scoped dataset exploration and classifier training
//!
//! A user uploads a CSV (or loads the bundled sample) and gets back a session
//! id. Every later call names that session: profile the raw data, impute
//! missing values, compare raw against cleaned distributions, train a
//! classifier with threshold analysis, and download the fitted model.
//! Session state lives entirely in files under one working directory.
//!
//! # Modules
//!
//! - [`session`] - session ids and the file-backed artifact store
//! - [`data`] - tabular dataset model, CSV codec, bundled sample
//! - [`stats`] - quantiles, histograms, Pearson correlation
//! - [`profiling`] - exploratory report (description, histograms, outliers)
//! - [`imputation`] - per-column null handling
//! - [`comparison`] - raw vs cleaned histograms on shared bins
//! - [`training`] - classifiers, evaluation metrics, run history
//! - [`lab`] - one method per operation, used by the server and CLI
//! - [`server`] - HTTP API
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;

// Storage and data model
pub mod session;
pub mod data;
pub mod stats;

// Pipeline stages
pub mod profiling;
pub mod imputation;
pub mod comparison;
pub mod training;

// Services
pub mod lab;
pub mod server;
pub mod cli;

pub use error::{DatalabError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{DatalabError, Result};

    pub use crate::session::{ArtifactRole, SessionId, SessionStore};
    pub use crate::data::{Column, ColumnValues, Dataset};

    pub use crate::profiling::{DatasetProfiler, EdaReport};
    pub use crate::imputation::{ImputeStrategy, Imputer, StrategyMap};
    pub use crate::comparison::{ComparisonEngine, ComparisonReport};
    pub use crate::training::{
        HyperParams, ModelArtifact, ModelFamily, TrainEngine, TrainingConfig, TrainingHistory,
        TrainingReport,
    };

    pub use crate::lab::DataLab;
}
