//! Data lab - main entry point
//!
//! Runs the HTTP server by default; `profile` and `train` work on local files.

use clap::Parser;
use datalab::cli::{cmd_profile, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datalab=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port, data_dir }) => {
            cmd_serve(host, port, data_dir).await?;
        }
        Some(Commands::Profile { data }) => {
            cmd_profile(&data)?;
        }
        Some(Commands::Train { data, model, target, params, output }) => {
            cmd_train(&data, &model, target, &params, output.as_deref())?;
        }
        None => {
            cmd_serve(None, None, None).await?;
        }
    }

    Ok(())
}
