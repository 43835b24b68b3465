//! Wave power flux pipeline.
//!
//! Loads a pipeline configuration, runs every configured source and writes
//! the fused dataset together with a JSON run summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pipeline::{load_config, metrics, write_dataset, write_summary, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "wave-pipeline")]
#[command(about = "Fuse buoy, reanalysis and satellite wave data into gridded power flux statistics")]
struct Args {
    /// Pipeline configuration file
    #[arg(short, long, env = "WAVE_PIPELINE_CONFIG", default_value = "config/pipeline.yaml")]
    config: PathBuf,

    /// Log level (overrides the configuration)
    #[arg(long, env = "WAVE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Fused dataset path (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write Prometheus metrics in text format to this file after the run
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    validate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.to_lowercase();
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }

    // Initialize tracing
    let level = match config.logging.level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);
    if config.logging.format == "json" {
        tracing::subscriber::set_global_default(builder.with_thread_ids(true).json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.pretty().finish())?;
    }

    info!(config = %args.config.display(), "Starting wave pipeline");

    let handle = match &args.metrics_out {
        Some(_) => Some(metrics::install_recorder()?),
        None => None,
    };

    let output = config.output.clone();
    let orchestrator = Orchestrator::new(config).context("Pipeline configuration rejected")?;
    if args.validate_only {
        info!("Configuration is valid");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling pipeline");
            ctrl_c_token.cancel();
        }
    });

    let run = orchestrator.run(cancel).await?;

    write_dataset(&run.dataset, &output.path, output.format)?;
    write_summary(&run.summary, &output.summary_path())?;

    if let (Some(path), Some(handle)) = (&args.metrics_out, handle) {
        std::fs::write(path, handle.render())
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!(path = %path.display(), "Wrote metrics");
    }

    info!(
        rows = run.summary.fused_rows,
        warnings = run.summary.warnings.len(),
        "Wave pipeline finished"
    );
    Ok(())
}
