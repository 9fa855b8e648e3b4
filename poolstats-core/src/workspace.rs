//! Epoch-keyed workspace directories.
//!
//! Layout: `{data_dir}/epoch_{EPOCH}/`
//!
//! - `genesis.tar.bz2`, `snapshot-*.tar.zst`: downloaded once by prepare
//! - `rocksdb/`, `stake-pools.accounts/`, `genesis.bin`: unpacked by the
//!   metas generator; purged before every generation run
//! - `workspace.json`: preparation sidecar (slot, snapshot source, time)
//!
//! Preparing is one-shot: an existing directory is an error, so downloads
//! from two different runs never mix. Resetting derived state is
//! idempotent and never touches the downloaded archives.

use crate::domain::{epoch_dir_name, parse_epoch_dir, Epoch, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const GENESIS_ARCHIVE: &str = "genesis.tar.bz2";
const LEDGER_STATE_DIR: &str = "rocksdb";
const ACCOUNTS_DIR: &str = "stake-pools.accounts";
const GENESIS_UNPACKED: &str = "genesis.bin";
const META_FILE: &str = "workspace.json";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("epoch {epoch} already exists at {}", .path.display())]
    AlreadyExists { epoch: Epoch, path: PathBuf },

    #[error("epoch {epoch} not prepped (expected {})", .path.display())]
    NotPrepared { epoch: Epoch, path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("workspace metadata: {0}")]
    Meta(String),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WorkspaceError + '_ {
    move |source| WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Sidecar written after a successful preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub epoch: Epoch,
    pub slot: Slot,
    pub snapshot_file: String,
    pub snapshot_url: String,
    pub warehouse: String,
    pub preferred_warehouse: bool,
    pub prepared_at: DateTime<Utc>,
}

/// Handle to one epoch's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochWorkspace {
    epoch: Epoch,
    path: PathBuf,
}

impl EpochWorkspace {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn genesis_archive(&self) -> PathBuf {
        self.path.join(GENESIS_ARCHIVE)
    }

    /// Path for a downloaded file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.path.join(META_FILE)
    }

    /// Transient paths the generator creates while unpacking.
    pub fn derived_paths(&self) -> [PathBuf; 3] {
        [
            self.path.join(LEDGER_STATE_DIR),
            self.path.join(ACCOUNTS_DIR),
            self.path.join(GENESIS_UNPACKED),
        ]
    }

    pub fn has_derived_artifacts(&self) -> bool {
        self.derived_paths()
            .iter()
            .any(|p| fs::symlink_metadata(p).is_ok())
    }
}

/// Filesystem store of epoch workspaces.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn workspace_path(&self, epoch: Epoch) -> PathBuf {
        self.data_dir.join(epoch_dir_name(epoch))
    }

    pub fn exists(&self, epoch: Epoch) -> bool {
        self.workspace_path(epoch).is_dir()
    }

    /// Create the workspace for `epoch`. Fails if it already exists.
    pub fn prepare(&self, epoch: Epoch) -> Result<EpochWorkspace, WorkspaceError> {
        fs::create_dir_all(&self.data_dir).map_err(io_err(&self.data_dir))?;

        let path = self.workspace_path(epoch);
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::AlreadyExists { epoch, path });
            }
            Err(e) => return Err(io_err(&path)(e)),
        }
        info!(%epoch, path = %path.display(), "created epoch workspace");
        Ok(EpochWorkspace { epoch, path })
    }

    /// Open an existing workspace.
    pub fn open(&self, epoch: Epoch) -> Result<EpochWorkspace, WorkspaceError> {
        let path = self.workspace_path(epoch);
        if !path.is_dir() {
            return Err(WorkspaceError::NotPrepared { epoch, path });
        }
        Ok(EpochWorkspace { epoch, path })
    }

    /// Remove the transient ledger state, accounts store, and unpacked genesis.
    ///
    /// Missing paths are fine; calling this twice is the same as once.
    pub fn reset_derived(&self, workspace: &EpochWorkspace) -> Result<(), WorkspaceError> {
        for path in workspace.derived_paths() {
            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(&path)(e)),
            };
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => debug!(path = %path.display(), "removed stale artifact"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(&path)(e)),
            }
        }
        Ok(())
    }

    /// Epochs with a workspace directory, ascending. A missing data dir is empty.
    pub fn list_epochs(&self) -> Result<Vec<Epoch>, WorkspaceError> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.data_dir)(e)),
        };

        let mut epochs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&self.data_dir))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(epoch) = entry.file_name().to_str().and_then(parse_epoch_dir) {
                epochs.push(epoch);
            }
        }
        epochs.sort();
        Ok(epochs)
    }

    pub fn write_meta(
        &self,
        workspace: &EpochWorkspace,
        meta: &WorkspaceMeta,
    ) -> Result<(), WorkspaceError> {
        let json = serde_json::to_string_pretty(meta)
            .map_err(|e| WorkspaceError::Meta(format!("serialization: {e}")))?;
        let path = workspace.meta_path();
        fs::write(&path, json).map_err(io_err(&path))
    }

    /// Read the preparation sidecar, `None` if the workspace has none.
    pub fn read_meta(
        &self,
        workspace: &EpochWorkspace,
    ) -> Result<Option<WorkspaceMeta>, WorkspaceError> {
        let path = workspace.meta_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| WorkspaceError::Meta(format!("{}: {e}", path.display())))
    }
}

/// Files in `dir` whose names `parse` maps to an epoch, ascending by epoch.
///
/// Used to discover meta and stats artifacts. A missing directory is empty.
pub fn scan_artifacts(
    dir: &Path,
    parse: fn(&str) -> Option<Epoch>,
) -> io::Result<Vec<(Epoch, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(epoch) = entry.file_name().to_str().and_then(parse) {
            found.push((epoch, path));
        }
    }
    found.sort_by_key(|(epoch, _)| *epoch);
    Ok(found)
}
