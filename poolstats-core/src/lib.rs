//! poolstats core: epoch domain types and the collaborators of the pipeline.
//!
//! - Epoch / slot newtypes and artifact naming
//! - Epoch-keyed workspace store with stale-artifact cleanup
//! - Snapshot discovery and selection over a blob store
//! - Epoch-to-slot resolution over chain RPC
//! - GCS and HTTP clients behind traits, mockable in tests

pub mod chain;
pub mod domain;
pub mod snapshot;
pub mod storage;
pub mod workspace;

pub use chain::{ChainRpc, EpochResolver, ResolutionError, RpcError};
pub use domain::{Epoch, Slot, MIN_SUPPORTED_EPOCH};
pub use snapshot::{SelectedSnapshot, SelectionPolicy, SnapshotError, SnapshotLocator};
pub use storage::{BlobObject, BlobStore, Fetcher, ObjectAcl, StorageError, TransferProgress};
pub use workspace::{ArtifactStore, EpochWorkspace, WorkspaceError, WorkspaceMeta};
