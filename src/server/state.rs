//! Application state shared across handlers

use crate::error::Result;
use crate::lab::DataLab;

use super::ServerConfig;

/// Immutable per-process state. Sessions live on disk, so there is nothing
/// to lock here.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub lab: DataLab,
}

impl AppState {
    /// Open the working directory named by `config`
    pub fn new(config: ServerConfig) -> Result<Self> {
        let lab = DataLab::open(&config.data_dir)?
            .with_sample_dataset(config.sample_dataset.clone());
        Ok(Self { config, lab })
    }
}
