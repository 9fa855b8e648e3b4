//! Per-epoch pipeline orchestration.
//!
//! Single-epoch runs are fail-fast: the first error is the run's result.
//! Batch runs are best-effort: a missing generator aborts before any work,
//! but per-epoch failures (RPC resolution, generator exit status) are
//! recorded and the batch moves on, since epochs are independent.
//!
//! Everything is sequential. One epoch at a time, one blocking call at a
//! time; nothing here is safe to run concurrently against the same data
//! directory.

use crate::generator::{Generator, GeneratorError, MetasRequest, Stage, StatsRequest};
use crate::prepare::{prepare_epoch, PreparedEpoch};
use poolstats_core::domain::{metas_file_name, parse_metas_file, stats_file_name};
use poolstats_core::snapshot::SelectionPolicy;
use poolstats_core::storage::{BlobStore, Fetcher, StorageError, TransferProgress};
use poolstats_core::workspace::{scan_artifacts, ArtifactStore, WorkspaceError};
use poolstats_core::{
    ChainRpc, Epoch, EpochResolver, ResolutionError, SnapshotError, SnapshotLocator,
};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("epoch {epoch} is not supported (minimum is {})", poolstats_core::MIN_SUPPORTED_EPOCH)]
    UnsupportedEpoch { epoch: Epoch },

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("slot resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("download failed: {0}")]
    Download(#[from] StorageError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Errors that stop a batch outright instead of failing one epoch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Generator(GeneratorError::BinaryNotFound { .. })
                | PipelineError::Generator(GeneratorError::Spawn { .. })
        )
    }
}

/// Whether stats for `epoch` should price from live sources.
///
/// Only the epoch right before the live one qualifies: its historical
/// prices may not be indexed yet.
pub fn uses_live_price_fallback(epoch: Epoch, live_epoch: Epoch) -> bool {
    live_epoch.previous() == Some(epoch)
}

/// Why a batch passed over an epoch without running a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Below the minimum supported epoch.
    Unsupported,
    /// Listed, but the workspace was gone by the time it was processed.
    NotPrepared,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsupported => write!(f, "not supported"),
            SkipReason::NotPrepared => write!(f, "not prepped"),
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub stage: Option<Stage>,
    pub processed: Vec<Epoch>,
    pub skipped: Vec<(Epoch, SkipReason)>,
    pub failed: Vec<(Epoch, PipelineError)>,
}

impl BatchSummary {
    fn new(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.failed.len()
    }
}

/// Artifacts produced by a single-epoch run.
#[derive(Debug, Clone)]
pub struct EpochRun {
    pub epoch: Epoch,
    pub prepared: Option<PreparedEpoch>,
    pub metas_path: PathBuf,
    pub stats_path: PathBuf,
    pub live_price_fallback: bool,
}

/// Paths and policies the orchestrator works with.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub genesis_url: String,
    pub selection: SelectionPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &crate::config::PipelineConfig) -> Self {
        Self {
            data_dir: config.paths.data_dir.clone(),
            output_dir: config.paths.output_dir.clone(),
            genesis_url: config.snapshots.genesis_url.clone(),
            selection: config.selection_policy(),
        }
    }
}

/// External collaborators, borrowed for the lifetime of the orchestrator.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub rpc: &'a dyn ChainRpc,
    pub snapshots: &'a dyn BlobStore,
    pub fetcher: &'a dyn Fetcher,
    pub progress: &'a dyn TransferProgress,
    pub generator: &'a dyn Generator,
}

/// Drives preparation and generation for one or many epochs.
pub struct PipelineOrchestrator<'a> {
    store: ArtifactStore,
    output_dir: PathBuf,
    genesis_url: String,
    resolver: EpochResolver<'a>,
    locator: SnapshotLocator<'a>,
    services: Services<'a>,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(settings: PipelineSettings, services: Services<'a>) -> Self {
        Self {
            store: ArtifactStore::new(settings.data_dir),
            output_dir: settings.output_dir,
            genesis_url: settings.genesis_url,
            resolver: EpochResolver::new(services.rpc),
            locator: SnapshotLocator::new(services.snapshots, settings.selection),
            services,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn metas_path(&self, epoch: Epoch) -> PathBuf {
        self.output_dir.join(metas_file_name(epoch))
    }

    pub fn stats_path(&self, epoch: Epoch) -> PathBuf {
        self.output_dir.join(stats_file_name(epoch))
    }

    fn ensure_output_dir(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| PipelineError::Io {
            path: self.output_dir.clone(),
            source,
        })
    }

    /// Create and fill the workspace for `epoch`.
    pub fn prepare(&self, epoch: Epoch) -> Result<PreparedEpoch, PipelineError> {
        prepare_epoch(
            epoch,
            &self.store,
            &self.resolver,
            &self.locator,
            self.services.fetcher,
            self.services.progress,
            &self.genesis_url,
        )
    }

    /// Resolve, reset, and run the metas generator for one prepared epoch.
    fn run_metas(&self, epoch: Epoch) -> Result<PathBuf, PipelineError> {
        let workspace = self.store.open(epoch)?;
        let slot = self.resolver.last_slot(epoch)?;
        info!(%epoch, %slot, "processing epoch");

        self.store.reset_derived(&workspace)?;

        let out_path = self.metas_path(epoch);
        self.services.generator.generate_metas(&MetasRequest {
            epoch,
            ledger_path: workspace.path().to_path_buf(),
            out_path: out_path.clone(),
            slot,
        })?;
        Ok(out_path)
    }

    fn run_stats(&self, epoch: Epoch, live_epoch: Epoch) -> Result<(PathBuf, bool), PipelineError> {
        let fallback = uses_live_price_fallback(epoch, live_epoch);
        let out_path = self.stats_path(epoch);
        info!(%epoch, live_price_fallback = fallback, "generating stats");

        self.services.generator.generate_stats(&StatsRequest {
            epoch,
            metas_dir: self.output_dir.clone(),
            out_path: out_path.clone(),
            use_live_price_fallback: fallback,
        })?;
        Ok((out_path, fallback))
    }

    /// Metas for a single, already prepared epoch. Fail-fast.
    pub fn generate_metas_for(&self, epoch: Epoch) -> Result<PathBuf, PipelineError> {
        if !epoch.is_supported() {
            return Err(PipelineError::UnsupportedEpoch { epoch });
        }
        self.services.generator.ensure_available(Stage::Metas)?;
        self.ensure_output_dir()?;
        self.run_metas(epoch)
    }

    /// Full pipeline for one epoch: prepare if needed, metas, stats. Fail-fast.
    pub fn run_epoch(&self, epoch: Epoch) -> Result<EpochRun, PipelineError> {
        if !epoch.is_supported() {
            return Err(PipelineError::UnsupportedEpoch { epoch });
        }
        self.services.generator.ensure_available(Stage::Metas)?;
        self.services.generator.ensure_available(Stage::Stats)?;

        let prepared = if self.store.exists(epoch) {
            info!(%epoch, "workspace already prepared");
            None
        } else {
            Some(self.prepare(epoch)?)
        };

        self.ensure_output_dir()?;
        let metas_path = self.run_metas(epoch)?;

        let live_epoch = self.resolver.live_epoch()?;
        let (stats_path, live_price_fallback) = self.run_stats(epoch, live_epoch)?;

        Ok(EpochRun {
            epoch,
            prepared,
            metas_path,
            stats_path,
            live_price_fallback,
        })
    }

    /// Metas for every prepared epoch, ascending. Best-effort.
    pub fn generate_all_metas(&self) -> Result<BatchSummary, PipelineError> {
        self.services.generator.ensure_available(Stage::Metas)?;
        self.ensure_output_dir()?;

        let mut summary = BatchSummary::new(Stage::Metas);
        for epoch in self.store.list_epochs()? {
            if !epoch.is_supported() {
                info!(%epoch, "skipping epoch - not supported");
                summary.skipped.push((epoch, SkipReason::Unsupported));
                continue;
            }
            if !self.store.exists(epoch) {
                warn!(%epoch, "epoch not prepped, skipping");
                summary.skipped.push((epoch, SkipReason::NotPrepared));
                continue;
            }

            match self.run_metas(epoch) {
                Ok(_) => {
                    info!(%epoch, "done processing epoch");
                    summary.processed.push(epoch);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(%epoch, error = %e, "metas generation failed, continuing");
                    summary.failed.push((epoch, e));
                }
            }
        }
        Ok(summary)
    }

    /// Stats for every meta artifact in the output directory, ascending. Best-effort.
    pub fn generate_all_stats(&self) -> Result<BatchSummary, PipelineError> {
        self.services.generator.ensure_available(Stage::Stats)?;
        let live_epoch = self.resolver.live_epoch()?;
        info!(%live_epoch, "generating stats for all epochs");

        let metas = scan_artifacts(&self.output_dir, parse_metas_file).map_err(|source| {
            PipelineError::Io {
                path: self.output_dir.clone(),
                source,
            }
        })?;

        let mut summary = BatchSummary::new(Stage::Stats);
        for (epoch, _) in metas {
            if !epoch.is_supported() {
                info!(%epoch, "skipping epoch - not supported");
                summary.skipped.push((epoch, SkipReason::Unsupported));
                continue;
            }

            match self.run_stats(epoch, live_epoch) {
                Ok(_) => summary.processed.push(epoch),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(%epoch, error = %e, "stats generation failed, continuing");
                    summary.failed.push((epoch, e));
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_only_for_epoch_before_live() {
        assert!(uses_live_price_fallback(Epoch(519), Epoch(520)));
        assert!(!uses_live_price_fallback(Epoch(520), Epoch(520)));
        assert!(!uses_live_price_fallback(Epoch(518), Epoch(520)));
        assert!(!uses_live_price_fallback(Epoch(0), Epoch(0)));
    }

    #[test]
    fn missing_binary_is_fatal_but_exit_status_is_not() {
        let fatal = PipelineError::Generator(GeneratorError::BinaryNotFound {
            stage: Stage::Metas,
            path: PathBuf::from("target/release/generate-metas"),
        });
        assert!(fatal.is_fatal());

        let per_epoch = PipelineError::Generator(GeneratorError::GeneratorFailed {
            stage: Stage::Metas,
            epoch: Epoch(516),
            code: Some(1),
        });
        assert!(!per_epoch.is_fatal());
    }

    #[test]
    fn summary_counts() {
        let mut summary = BatchSummary::new(Stage::Stats);
        assert!(summary.all_succeeded());
        summary.processed.push(Epoch(516));
        summary.skipped.push((Epoch(500), SkipReason::Unsupported));
        summary.failed.push((
            Epoch(517),
            PipelineError::UnsupportedEpoch { epoch: Epoch(517) },
        ));
        assert_eq!(summary.total(), 3);
        assert!(!summary.all_succeeded());
    }
}
