//! poolstats CLI: prepare epochs, run the generators, publish stats.
//!
//! Commands:
//! - `prepare`: create an epoch workspace and download genesis + snapshot
//! - `metas` / `metas-all`: generate stake pool metas for prepared epochs
//! - `stats-all`: generate normalized stats for every metas artifact
//! - `run`: full single-epoch pipeline (prepare if needed, metas, stats)
//! - `publish`: upload stats and the manifest

mod logger;
mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poolstats_core::chain::JsonRpcClient;
use poolstats_core::storage::{GcsBucket, HttpFetcher};
use poolstats_core::Epoch;
use poolstats_runner::{
    BatchSummary, GeneratorInvoker, ManifestPublisher, PipelineConfig, PipelineOrchestrator,
    PipelineSettings, Services,
};
use std::path::PathBuf;
use tracing::info;

use crate::progress::BarProgress;

#[derive(Parser)]
#[command(
    name = "poolstats",
    about = "poolstats: stake pool analytics epoch pipeline"
)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Parent directory of the epoch workspaces.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for metas and stats artifacts.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace for an epoch and download genesis and snapshot.
    Prepare {
        epoch: u64,
        /// RPC endpoint. Overrides the config file.
        rpc_endpoint: Option<String>,
    },
    /// Generate metas for one prepared epoch.
    Metas {
        epoch: u64,
        rpc_endpoint: Option<String>,
    },
    /// Generate metas for every prepared epoch.
    MetasAll { rpc_endpoint: Option<String> },
    /// Generate stats for every metas artifact in the output directory.
    StatsAll { rpc_endpoint: Option<String> },
    /// Prepare (if needed), generate metas, and generate stats for one epoch.
    Run {
        epoch: u64,
        rpc_endpoint: Option<String>,
    },
    /// Upload stats artifacts and the manifest to the publish bucket.
    Publish,
}

impl Commands {
    fn rpc_endpoint(&self) -> Option<&str> {
        match self {
            Commands::Prepare { rpc_endpoint, .. }
            | Commands::Metas { rpc_endpoint, .. }
            | Commands::MetasAll { rpc_endpoint }
            | Commands::StatsAll { rpc_endpoint }
            | Commands::Run { rpc_endpoint, .. } => rpc_endpoint.as_deref(),
            Commands::Publish => None,
        }
    }
}

fn main() -> Result<()> {
    logger::setup_logger();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Publish => run_publish(&config),
        command => run_pipeline_cmd(&config, command),
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.paths.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.paths.output_dir = dir.clone();
    }
    if let Some(endpoint) = cli.command.rpc_endpoint() {
        config.rpc.endpoint = endpoint.to_string();
    }
    Ok(config)
}

fn run_pipeline_cmd(config: &PipelineConfig, command: Commands) -> Result<()> {
    let timeout = config.http_timeout();
    let rpc = JsonRpcClient::new(config.rpc.endpoint.as_str(), timeout)?;
    let snapshots = GcsBucket::anonymous(config.snapshots.bucket.as_str(), timeout)?;
    let fetcher = HttpFetcher::new(timeout)?;
    let progress = BarProgress::new();
    let generator = GeneratorInvoker::from_config(&config.generators, &config.paths.generator_dir);

    let orchestrator = PipelineOrchestrator::new(
        PipelineSettings::from_config(config),
        Services {
            rpc: &rpc,
            snapshots: &snapshots,
            fetcher: &fetcher,
            progress: &progress,
            generator: &generator,
        },
    );
    info!(rpc = %config.rpc.endpoint, data_dir = %config.paths.data_dir.display(), "pipeline ready");

    match command {
        Commands::Prepare { epoch, .. } => {
            let prepared = orchestrator.prepare(Epoch(epoch))?;
            println!(
                "Prepared epoch {} at {} (slot {}, snapshot {} from {})",
                epoch,
                prepared.workspace.path().display(),
                prepared.meta.slot,
                prepared.meta.snapshot_file,
                prepared.meta.warehouse,
            );
        }
        Commands::Metas { epoch, .. } => {
            let path = orchestrator.generate_metas_for(Epoch(epoch))?;
            println!("Metas written to {}", path.display());
        }
        Commands::Run { epoch, .. } => {
            let run = orchestrator.run_epoch(Epoch(epoch))?;
            println!("Epoch {epoch}");
            println!("  metas: {}", run.metas_path.display());
            println!("  stats: {}", run.stats_path.display());
            if run.live_price_fallback {
                println!("  (live price fallback)");
            }
        }
        Commands::MetasAll { .. } => {
            let summary = orchestrator.generate_all_metas()?;
            report_batch(&summary);
        }
        Commands::StatsAll { .. } => {
            let summary = orchestrator.generate_all_stats()?;
            report_batch(&summary);
        }
        Commands::Publish => run_publish(config)?,
    }
    Ok(())
}

fn report_batch(summary: &BatchSummary) {
    let stage = summary
        .stage
        .map(|s| s.to_string())
        .unwrap_or_else(|| "batch".to_string());
    println!(
        "{stage}: {} processed, {} skipped, {} failed",
        summary.processed.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    for (epoch, reason) in &summary.skipped {
        println!("  skipped {epoch}: {reason}");
    }

    if !summary.all_succeeded() {
        for (epoch, err) in &summary.failed {
            eprintln!("Error for epoch {epoch}: {err}");
        }
        std::process::exit(1);
    }
}

fn run_publish(config: &PipelineConfig) -> Result<()> {
    let publish = &config.publish;
    let token = std::env::var(&publish.token_env).with_context(|| {
        format!(
            "set {} to an access token with write access to bucket '{}'",
            publish.token_env, publish.bucket
        )
    })?;
    let bucket = GcsBucket::authenticated(publish.bucket.as_str(), token, config.http_timeout())?;

    let report = ManifestPublisher::new(&bucket, publish.prefix.as_str())
        .publish(&config.paths.output_dir)?;

    for object in &report.uploaded {
        println!("Uploaded {object}");
    }
    println!(
        "Manifest {} ({} epochs, latest {})",
        report.manifest_object,
        report.manifest.epochs.len(),
        report
            .manifest
            .latest
            .map(|e| e.to_string())
            .unwrap_or_else(|| "none".to_string()),
    );
    println!("{}", serde_json::to_string_pretty(&report.manifest)?);
    Ok(())
}
