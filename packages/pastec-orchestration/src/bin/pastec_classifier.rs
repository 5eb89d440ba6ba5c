//! PASTEC consensus classifier CLI
//!
//! # Usage
//!
//! ```bash
//! # Detection, classification and post-processing
//! pastec-classifier -i DmelChr4_consensus.fa -C pastec.yml
//!
//! # Classification only, split over jobs, with decision rules
//! pastec-classifier -i DmelChr4_consensus.fa -C pastec.yml -D rules.yml -S 2 -p
//! ```

use anyhow::Context;
use clap::Parser;
use pastec_orchestration::{
    Collaborators, Config, PipelineController, RunRequest, Steps,
};
use pastec_storage::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pastec-classifier")]
#[command(about = "Classify TE consensus sequences and post-process the classification", long_about = None)]
struct Cli {
    /// Input fasta file of consensus sequences
    #[arg(short = 'i', long = "fasta")]
    fasta: PathBuf,

    /// YAML configuration file
    #[arg(short = 'C', long = "config")]
    config: PathBuf,

    /// Decision rules file forwarded to the classifier
    #[arg(short = 'D', long = "decision-rules")]
    decision_rules: Option<PathBuf>,

    /// Steps to run: 1 = feature detection, 2 = classification, 0 = all
    #[arg(short = 'S', long = "step", default_value = "0")]
    step: String,

    /// Split classification into jobs run on the execution resource
    #[arg(short = 'p', long)]
    parallel: bool,

    /// Remove temporary files
    #[arg(short = 'c', long)]
    clean: bool,

    /// Verbosity: 1 = errors, 2 = warnings, 3 = info, 4 = debug
    #[arg(short = 'v', long, default_value = "3", value_parser = clap::value_parser!(u8).range(1..=4))]
    verbosity: u8,

    /// Working directory (defaults to the current directory)
    #[arg(short = 'w', long = "work-dir")]
    work_dir: Option<PathBuf>,
}

fn level(verbosity: u8) -> &'static str {
    match verbosity {
        0 | 1 => "error",
        2 => "warn",
        3 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level(cli.verbosity)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<pastec_orchestration::PipelineError>() {
            Some(pipeline_err) => error!("[{}] {}", pipeline_err.kind(), pipeline_err),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_yaml(&cli.config)?;
    let steps = Steps::parse(&cli.step)?;

    let work_dir = match cli.work_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    std::fs::create_dir_all(&work_dir)
        .with_context(|| format!("Cannot create working directory {}", work_dir.display()))?;
    let work_dir = work_dir.canonicalize()?;

    let store_path = work_dir.join(&config.store.path);
    let store = SqliteStore::open(&store_path)
        .with_context(|| format!("Cannot open store {}", store_path.display()))?;
    info!("Store: {}", store_path.display());

    let collaborators = Collaborators::from_config(&config, cli.parallel);
    let controller =
        PipelineController::new(Arc::new(config), work_dir, collaborators, Arc::new(store));

    let request = RunRequest {
        fasta: cli.fasta,
        decision_rules: cli.decision_rules,
        steps,
        parallel: cli.parallel,
        clean: cli.clean,
        verbosity: cli.verbosity,
    };

    let report = controller.run(request).await?;
    if let Some(pair) = report.final_pair() {
        info!(
            "Final artifacts: {} ({} rows stored)",
            pair,
            report.rows_stored
        );
    }
    Ok(())
}
