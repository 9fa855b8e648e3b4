//! External generator invocation.
//!
//! The metas and stats generators are separate executables, normally the
//! release builds sitting in `target/release`. They are run synchronously
//! with a fixed argument contract and a `RUST_LOG` override; only the exit
//! status is observed.
//!
//! The `Generator` trait lets the orchestrator run against a recording
//! double in tests.

use crate::config::GeneratorConfig;
use poolstats_core::{Epoch, Slot};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Which generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Metas,
    Stats,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Metas => write!(f, "metas"),
            Stage::Stats => write!(f, "stats"),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{stage} generator not found at {} (have you built the crate?)", .path.display())]
    BinaryNotFound { stage: Stage, path: PathBuf },

    #[error("failed to launch {stage} generator {}: {source}", .path.display())]
    Spawn {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} generator failed for epoch {epoch} ({})", describe_exit(.code))]
    GeneratorFailed {
        stage: Stage,
        epoch: Epoch,
        code: Option<i32>,
    },
}

/// Arguments for one metas generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetasRequest {
    pub epoch: Epoch,
    /// Epoch workspace holding the genesis and snapshot archives.
    pub ledger_path: PathBuf,
    pub out_path: PathBuf,
    pub slot: Slot,
}

impl MetasRequest {
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--ledger-path".into(),
            self.ledger_path.clone().into_os_string(),
            "--out-path".into(),
            self.out_path.clone().into_os_string(),
            "--snapshot-slot".into(),
            self.slot.to_string().into(),
        ]
    }
}

/// Arguments for one stats generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub epoch: Epoch,
    pub metas_dir: PathBuf,
    pub out_path: PathBuf,
    /// Price the epoch from live sources; only for the latest completed epoch.
    pub use_live_price_fallback: bool,
}

impl StatsRequest {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--metas-dir".into(),
            self.metas_dir.clone().into_os_string(),
            "--out-path".into(),
            self.out_path.clone().into_os_string(),
            "--epoch".into(),
            self.epoch.to_string().into(),
        ];
        if self.use_live_price_fallback {
            args.push("--use-live-price-fallback".into());
        }
        args
    }
}

/// Something that can produce meta and stats artifacts.
pub trait Generator {
    /// Fail fast if the generator for `stage` cannot be run at all.
    fn ensure_available(&self, stage: Stage) -> Result<(), GeneratorError>;

    fn generate_metas(&self, req: &MetasRequest) -> Result<(), GeneratorError>;

    fn generate_stats(&self, req: &StatsRequest) -> Result<(), GeneratorError>;
}

/// Runs the generator executables as child processes.
#[derive(Debug, Clone)]
pub struct GeneratorInvoker {
    metas_bin: PathBuf,
    stats_bin: PathBuf,
    log_level: String,
}

impl GeneratorInvoker {
    pub fn new(metas_bin: PathBuf, stats_bin: PathBuf, log_level: impl Into<String>) -> Self {
        Self {
            metas_bin,
            stats_bin,
            log_level: log_level.into(),
        }
    }

    /// Binaries named by `config`, looked up in `generator_dir`.
    pub fn from_config(config: &GeneratorConfig, generator_dir: &Path) -> Self {
        Self::new(
            generator_dir.join(&config.metas_binary),
            generator_dir.join(&config.stats_binary),
            config.log_level.clone(),
        )
    }

    pub fn binary(&self, stage: Stage) -> &Path {
        match stage {
            Stage::Metas => &self.metas_bin,
            Stage::Stats => &self.stats_bin,
        }
    }

    fn run(&self, stage: Stage, epoch: Epoch, args: Vec<OsString>) -> Result<(), GeneratorError> {
        self.ensure_available(stage)?;
        let bin = self.binary(stage);
        debug!(%stage, %epoch, bin = %bin.display(), ?args, "invoking generator");

        let status = Command::new(bin)
            .args(&args)
            .env("RUST_LOG", &self.log_level)
            .status()
            .map_err(|source| GeneratorError::Spawn {
                stage,
                path: bin.to_path_buf(),
                source,
            })?;

        if !status.success() {
            return Err(GeneratorError::GeneratorFailed {
                stage,
                epoch,
                code: status.code(),
            });
        }
        info!(%stage, %epoch, "generator finished");
        Ok(())
    }
}

impl Generator for GeneratorInvoker {
    fn ensure_available(&self, stage: Stage) -> Result<(), GeneratorError> {
        let bin = self.binary(stage);
        if !bin.is_file() {
            return Err(GeneratorError::BinaryNotFound {
                stage,
                path: bin.to_path_buf(),
            });
        }
        Ok(())
    }

    fn generate_metas(&self, req: &MetasRequest) -> Result<(), GeneratorError> {
        self.run(Stage::Metas, req.epoch, req.args())
    }

    fn generate_stats(&self, req: &StatsRequest) -> Result<(), GeneratorError> {
        self.run(Stage::Stats, req.epoch, req.args())
    }
}
