//! Epoch preparation: workspace, genesis, snapshot.
//!
//! Preparing an epoch creates its workspace, downloads the genesis archive,
//! resolves the epoch's last slot, picks a snapshot for that slot, downloads
//! it, and records where it came from in the workspace sidecar.
//!
//! A failed preparation removes the half-filled workspace so the next
//! attempt starts clean instead of tripping over `AlreadyExists`.

use crate::pipeline::PipelineError;
use chrono::Utc;
use poolstats_core::storage::{Fetcher, TransferProgress};
use poolstats_core::workspace::{ArtifactStore, EpochWorkspace, WorkspaceMeta};
use poolstats_core::{Epoch, EpochResolver, SnapshotLocator};
use std::fs;
use tracing::{info, warn};

/// A freshly prepared workspace and its sidecar.
#[derive(Debug, Clone)]
pub struct PreparedEpoch {
    pub workspace: EpochWorkspace,
    pub meta: WorkspaceMeta,
}

/// Prepare `epoch` from scratch.
pub fn prepare_epoch(
    epoch: Epoch,
    store: &ArtifactStore,
    resolver: &EpochResolver<'_>,
    locator: &SnapshotLocator<'_>,
    fetcher: &dyn Fetcher,
    progress: &dyn TransferProgress,
    genesis_url: &str,
) -> Result<PreparedEpoch, PipelineError> {
    if !epoch.is_supported() {
        return Err(PipelineError::UnsupportedEpoch { epoch });
    }

    info!(%epoch, "preparing epoch folder");
    let workspace = store.prepare(epoch)?;

    match fill_workspace(&workspace, store, resolver, locator, fetcher, progress, genesis_url) {
        Ok(meta) => Ok(PreparedEpoch { workspace, meta }),
        Err(e) => {
            warn!(%epoch, error = %e, "preparation failed, removing workspace");
            if let Err(rm) = fs::remove_dir_all(workspace.path()) {
                warn!(%epoch, error = %rm, path = %workspace.path().display(), "could not remove workspace");
            }
            Err(e)
        }
    }
}

fn fill_workspace(
    workspace: &EpochWorkspace,
    store: &ArtifactStore,
    resolver: &EpochResolver<'_>,
    locator: &SnapshotLocator<'_>,
    fetcher: &dyn Fetcher,
    progress: &dyn TransferProgress,
    genesis_url: &str,
) -> Result<WorkspaceMeta, PipelineError> {
    let epoch = workspace.epoch();

    fetcher.fetch(genesis_url, &workspace.genesis_archive(), "genesis", progress)?;

    let slot = resolver.last_slot(epoch)?;
    info!(%epoch, %slot, "target slot");

    let snapshot = locator.locate(epoch, slot)?;
    let dest = workspace.file(&snapshot.file_name);
    fetcher.fetch(&snapshot.url, &dest, "snapshot", progress)?;

    let meta = WorkspaceMeta {
        epoch,
        slot,
        snapshot_file: snapshot.file_name,
        snapshot_url: snapshot.url,
        warehouse: snapshot.warehouse,
        preferred_warehouse: snapshot.preferred,
        prepared_at: Utc::now(),
    };
    store.write_meta(workspace, &meta)?;
    Ok(meta)
}
