//! Transaction Anomaly Engine - Main Entry Point
//!
//! `train` fits a fresh artifact bundle from a historical CSV; `score`
//! evaluates a batch against a frozen bundle and writes the enriched CSV.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use txn_anomaly_engine::config::AppConfig;
use txn_anomaly_engine::engine::AnomalyEngine;
use txn_anomaly_engine::metrics::BatchMetrics;
use txn_anomaly_engine::models::ArtifactStore;
use txn_anomaly_engine::training::TrainingPipeline;
use txn_anomaly_engine::{io, ModelArtifacts};

#[derive(Parser)]
#[command(name = "txn-anomaly-engine", about = "Hybrid rule + ML transaction anomaly scoring")]
struct Cli {
    /// Configuration file path
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a new artifact bundle from a historical record CSV
    Train {
        /// Historical records (CSV)
        #[arg(long)]
        input: PathBuf,
        /// Where to write the bundle; defaults to the configured path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score a batch of records and write the enriched CSV
    Score {
        /// Records to score (CSV)
        #[arg(long)]
        input: PathBuf,
        /// Enriched output (CSV)
        #[arg(long)]
        output: PathBuf,
        /// Artifact bundle; defaults to the configured path
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from_path(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    init_logging(&config);

    match cli.command {
        Command::Train { input, output } => {
            let records = io::read_records(&input)?;
            info!(rows = records.len(), "training corpus loaded");

            let pipeline = TrainingPipeline::new(config.training.clone(), config.rules.clone());
            let artifacts = pipeline.train(&records)?;

            let path = output.unwrap_or_else(|| PathBuf::from(&config.artifacts.path));
            artifacts.save(&path)?;
            println!("trained artifact bundle {} -> {}", artifacts.version, path.display());
        }
        Command::Score {
            input,
            output,
            artifacts,
        } => {
            let path = artifacts.unwrap_or_else(|| PathBuf::from(&config.artifacts.path));
            // Refuses to serve on any load failure; scoring never runs with
            // partial models.
            let store = ArtifactStore::open(&path)?;
            let bundle: std::sync::Arc<ModelArtifacts> = store.current();

            let records = io::read_records(&input)?;
            let engine = AnomalyEngine::new(config.rules.clone());
            let rows = engine.evaluate_batch(&records, &bundle);

            let file_name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string());
            let summary = BatchMetrics::from_rows(&rows).into_summary(&file_name);

            io::write_enriched(&output, &rows)?;
            println!(
                "scored {} rows ({} anomalous reasons tracked) -> {}",
                rows.len(),
                summary.metric_data.len(),
                output.display()
            );
        }
    }

    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
