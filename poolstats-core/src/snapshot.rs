//! Snapshot discovery and selection.
//!
//! Snapshot producers upload archives as
//! `<epoch>/<warehouse>/snapshot-<slot>-<hash>.tar.zst`. Several warehouses
//! may publish the same slot, and incremental snapshots share the naming
//! scheme, so selection works in two steps:
//!
//! 1. keep only full snapshots (strictly larger than the size floor) whose
//!    path matches the epoch and slot exactly;
//! 2. take the first one from the preferred warehouse, else the first one.
//!
//! "First" is the store's listing order. Candidates are never re-sorted, so
//! when several non-preferred warehouses match, which one wins depends on
//! how the store orders its listing.

use crate::domain::{Epoch, Slot};
use crate::storage::{BlobObject, BlobStore, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Anything at or below this size is an incremental or truncated upload.
pub const MIN_FULL_SNAPSHOT_BYTES: u64 = 10_000_000_000;

pub const DEFAULT_SNAPSHOT_BUCKET: &str = "jito-mainnet";

pub const DEFAULT_PREFERRED_WAREHOUSE: &str = "ny-mainnet-warehouse-1";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no full snapshot found for epoch {epoch} at slot {slot}")]
    NoSnapshotFound { epoch: Epoch, slot: Slot },

    #[error("listing snapshots failed: {0}")]
    Storage(#[from] StorageError),
}

/// Selection knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Substring identifying the preferred warehouse in an object path.
    pub preferred_warehouse: String,
    /// Size floor; candidates must be strictly larger.
    pub min_size_bytes: u64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            preferred_warehouse: DEFAULT_PREFERRED_WAREHOUSE.to_string(),
            min_size_bytes: MIN_FULL_SNAPSHOT_BYTES,
        }
    }
}

/// A listed object whose path matched the epoch/slot pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCandidate {
    pub name: String,
    pub size: u64,
    pub url: String,
    pub warehouse: String,
}

/// The snapshot chosen for an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedSnapshot {
    /// Last path segment, used as the local file name.
    pub file_name: String,
    pub url: String,
    pub size: u64,
    pub warehouse: String,
    /// Whether the preferred warehouse supplied it.
    pub preferred: bool,
}

/// Listing prefix that covers every candidate for `epoch`.
pub fn listing_prefix(epoch: Epoch) -> String {
    format!("{epoch}/")
}

/// Match `name` against `<epoch>/<warehouse>/snapshot-<slot>-<suffix>.tar.zst`.
///
/// Returns the warehouse segment on a match.
pub fn match_snapshot_path(name: &str, epoch: Epoch, slot: Slot) -> Option<&str> {
    let mut parts = name.split('/');
    let (epoch_part, warehouse, file) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || warehouse.is_empty() {
        return None;
    }
    if epoch_part != epoch.to_string() {
        return None;
    }
    let suffix = file
        .strip_prefix(&format!("snapshot-{slot}-"))?
        .strip_suffix(".tar.zst")?;
    if suffix.is_empty() {
        return None;
    }
    Some(warehouse)
}

/// Turn a raw listing into matching candidates, keeping listing order.
pub fn candidates_from_listing(
    objects: Vec<BlobObject>,
    epoch: Epoch,
    slot: Slot,
) -> Vec<SnapshotCandidate> {
    objects
        .into_iter()
        .filter_map(|obj| {
            let warehouse = match_snapshot_path(&obj.name, epoch, slot)?.to_string();
            Some(SnapshotCandidate {
                name: obj.name,
                size: obj.size,
                url: obj.media_link,
                warehouse,
            })
        })
        .collect()
}

/// Apply the size floor and warehouse preference.
pub fn select_snapshot(
    candidates: Vec<SnapshotCandidate>,
    policy: &SelectionPolicy,
    epoch: Epoch,
    slot: Slot,
) -> Result<SelectedSnapshot, SnapshotError> {
    let full: Vec<SnapshotCandidate> = candidates
        .into_iter()
        .filter(|c| {
            let keep = c.size > policy.min_size_bytes;
            if !keep {
                debug!(name = %c.name, size = c.size, "rejecting undersized snapshot");
            }
            keep
        })
        .collect();

    let preferred_idx = if policy.preferred_warehouse.is_empty() {
        None
    } else {
        full.iter()
            .position(|c| c.name.contains(policy.preferred_warehouse.as_str()))
    };
    let (idx, preferred) = match preferred_idx {
        Some(i) => (i, true),
        None if !full.is_empty() => (0, false),
        None => return Err(SnapshotError::NoSnapshotFound { epoch, slot }),
    };

    let chosen = full
        .into_iter()
        .nth(idx)
        .ok_or(SnapshotError::NoSnapshotFound { epoch, slot })?;
    let file_name = chosen
        .name
        .rsplit('/')
        .next()
        .unwrap_or(chosen.name.as_str())
        .to_string();

    Ok(SelectedSnapshot {
        file_name,
        url: chosen.url,
        size: chosen.size,
        warehouse: chosen.warehouse,
        preferred,
    })
}

/// Finds the snapshot for an epoch in a bucket.
pub struct SnapshotLocator<'a> {
    store: &'a dyn BlobStore,
    policy: SelectionPolicy,
}

impl<'a> SnapshotLocator<'a> {
    pub fn new(store: &'a dyn BlobStore, policy: SelectionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn locate(&self, epoch: Epoch, slot: Slot) -> Result<SelectedSnapshot, SnapshotError> {
        let objects = self.store.list(&listing_prefix(epoch))?;
        let candidates = candidates_from_listing(objects, epoch, slot);
        debug!(%epoch, %slot, count = candidates.len(), bucket = self.store.bucket(), "snapshot candidates");

        let selected = select_snapshot(candidates, &self.policy, epoch, slot)?;
        info!(
            %epoch,
            %slot,
            file = %selected.file_name,
            warehouse = %selected.warehouse,
            preferred = selected.preferred,
            "selected snapshot"
        );
        Ok(selected)
    }
}
