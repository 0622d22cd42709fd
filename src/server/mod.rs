//! Data lab HTTP server
//!
//! Session-addressed JSON API over [`crate::lab::DataLab`]. CPU-bound work
//! runs on tokio's blocking pool.

mod api;
mod error;
mod handlers;
mod state;

pub use api::{create_router, API_PREFIX};
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

/// Server configuration
///
/// Request bodies above `max_upload_size` get a 413. Training requests are
/// further bounded by [`crate::training::MAX_ESTIMATORS`] trees per
/// ensemble; larger `n_estimators` values get a 400.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Working directory holding every session's artifacts
    pub data_dir: PathBuf,
    /// Request body ceiling in bytes
    pub max_upload_size: usize,
    /// CSV served by `use_sample` instead of the bundled generator
    pub sample_dataset: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "temp_data".to_string())
                .into(),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024), // 100MB
            sample_dataset: std::env::var("SAMPLE_DATASET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(data_dir = %config.data_dir.display(), "Initializing working directory");

    let state = Arc::new(AppState::new(config.clone())?);
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        sample_dataset = ?config.sample_dataset,
        started_at = %start_time.to_rfc3339(),
        "Data lab server starting"
    );
    info!(url = %format!("http://{}{}", addr, API_PREFIX), "REST API available");
    info!(url = %format!("http://{}/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        if std::env::var("API_PORT").is_err() {
            assert_eq!(config.port, 8000);
        }
        if std::env::var("MAX_UPLOAD_SIZE").is_err() {
            assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
        }
    }
}
