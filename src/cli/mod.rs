//! Data lab CLI
//!
//! `serve` runs the HTTP API; `profile` and `train` run the same pipeline
//! stages directly on a local CSV file.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data;
use crate::profiling::DatasetProfiler;
use crate::server::{run_server, ServerConfig};
use crate::training::{TrainEngine, TrainingConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn metric_row(name: &str, value: String) {
    println!("  {:<18} {}", muted(name), value.white());
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "datalab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Session-based dataset exploration, cleaning and classifier training")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Server host (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Server port (defaults to API_PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Working directory for session artifacts (defaults to DATA_DIR or temp_data)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print exploratory statistics for a CSV file
    Profile {
        /// Input CSV file
        data: PathBuf,
    },

    /// Train a classifier on a CSV file and print its metrics
    Train {
        /// Input CSV file
        data: PathBuf,

        /// Model family (random_forest, gradient_boosting, logistic_regression)
        #[arg(short, long, default_value = "Random Forest")]
        model: String,

        /// Target column (defaults to Potability, else the last column)
        #[arg(short, long)]
        target: Option<String>,

        /// Hyperparameter override, repeatable: --param n_estimators=200
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Write the fitted model artifact here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_csv(path: &Path) -> anyhow::Result<data::Dataset> {
    let bytes = std::fs::read(path)?;
    Ok(data::read_csv(&bytes)?)
}

/// `key=value`; numbers, booleans and `null` are parsed as JSON, anything
/// else stays a string
pub fn parse_param(raw: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty hyperparameter name in '{}'", raw);
    }
    let value = value.trim();
    let parsed = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::default();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    run_server(config).await
}

pub fn cmd_profile(data_path: &Path) -> anyhow::Result<()> {
    section("Profile");

    step_run("Loading data");
    let start = Instant::now();
    let dataset = load_csv(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        dataset.n_rows(),
        dataset.n_cols(),
        start.elapsed()
    ));

    let report = DatasetProfiler.profile(&dataset);

    section("Columns");
    println!(
        "  {:<20} {:>7} {:>12} {:>12} {:>12} {:>12}",
        muted("column"), muted("nulls"), muted("mean"), muted("std"), muted("min"), muted("max")
    );
    for name in &report.columns {
        let nulls = report.null_counts.get(name).copied().unwrap_or(0);
        match report.description.get(name) {
            Some(d) => println!(
                "  {:<20} {:>7} {:>12} {:>12} {:>12} {:>12}",
                name, nulls, fmt_opt(d.mean), fmt_opt(d.std), fmt_opt(d.min), fmt_opt(d.max)
            ),
            None => println!("  {:<20} {:>7} {}", name, nulls, dim("categorical")),
        }
    }

    if !report.boxplots.is_empty() {
        section("Outliers (1.5×IQR)");
        for summary in &report.boxplots {
            println!(
                "  {:<20} {:>6} {}",
                summary.column,
                summary.outliers,
                dim(&format!("({:.1}%)", summary.outlier_percentage))
            );
        }
    }

    if let Some(target) = &report.target {
        section(&format!("Class balance · {}", target));
        for class in &report.class_distribution {
            println!(
                "  {:<20} {:>6} {}",
                class.label,
                class.count,
                dim(&format!("({:.1}%)", class.percentage))
            );
        }
    }

    println!();
    Ok(())
}

pub fn cmd_train(
    data_path: &Path,
    model: &str,
    target: Option<String>,
    params: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let dataset = load_csv(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        dataset.n_rows(),
        dataset.n_cols(),
        start.elapsed()
    ));

    let mut config = TrainingConfig {
        model_type: Some(model.to_string()),
        target_column: target,
        ..Default::default()
    };
    for raw in params {
        let (key, value) = parse_param(raw)?;
        config.params.insert(key, value);
    }

    step_run(&format!("Training {}", model.cyan()));
    let outcome = TrainEngine::new(config).run(&dataset)?;
    let report = &outcome.report;
    step_done(&format!("{:.3}s", report.training_time_secs));

    section(&format!("{} · target {}", report.model_type, report.target));
    metric_row("Accuracy", format!("{:.4}", report.accuracy));
    metric_row("Precision", format!("{:.4}", report.precision));
    metric_row("Recall", format!("{:.4}", report.recall));
    metric_row("F1 (weighted)", format!("{:.4}", report.f1_score));
    metric_row("ROC AUC", fmt_opt(report.auc_score));
    metric_row("Train / test", format!("{} / {}", report.train_size, report.test_size));

    section("Confusion matrix");
    let header: String = report.class_labels.iter().map(|l| format!("{:>8}", l)).collect();
    println!("  {:<12} {}", "", muted(&header));
    for (label, row) in report.class_labels.iter().zip(&report.confusion_matrix) {
        let cells: String = row.iter().map(|c| format!("{:>8}", c)).collect();
        println!("  {:<12} {}", muted(label), cells);
    }

    section("Top features");
    for item in &report.feature_importance {
        println!("  {:<20} {:.4}", item.feature, item.importance);
    }

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        std::fs::write(path, outcome.artifact.to_bytes()?)?;
        step_done("");
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("n_estimators=200").unwrap(),
            ("n_estimators".to_string(), serde_json::json!(200))
        );
        assert_eq!(
            parse_param("max_depth = None").unwrap(),
            ("max_depth".to_string(), serde_json::json!("None"))
        );
        assert_eq!(parse_param("C=0.5").unwrap().1, serde_json::json!(0.5));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn test_cli_parses_train_params() {
        let cli = Cli::try_parse_from([
            "datalab", "train", "water.csv", "--model", "gb", "--param", "learning_rate=0.05",
            "--param", "n_estimators=50",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Train { params, model, .. }) => {
                assert_eq!(model, "gb");
                assert_eq!(params.len(), 2);
            }
            _ => panic!("expected train"),
        }
    }
}
