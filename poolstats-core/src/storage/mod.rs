//! Object storage and bulk download.
//!
//! `BlobStore` covers the listing and upload primitives the pipeline needs
//! from a bucket; `Fetcher` covers streaming a URL to disk. Both are traits
//! so snapshot selection and publishing can run against in-memory doubles.

pub mod fetch;
pub mod gcs;

pub use fetch::{Fetcher, HttpFetcher, SilentProgress, TransferProgress};
pub use gcs::{GcsBucket, GCS_API_BASE};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed storage response: {0}")]
    Decode(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no credentials for authenticated access to bucket '{bucket}'")]
    MissingCredentials { bucket: String },
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobObject {
    /// Full object name including any `/`-separated path.
    pub name: String,
    pub size: u64,
    /// Direct download URL for the object body.
    pub media_link: String,
}

/// Access control applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    BucketDefault,
    PublicRead,
}

/// Bucket-level operations used by the pipeline.
pub trait BlobStore: Send + Sync {
    /// Bucket name, for logs and errors.
    fn bucket(&self) -> &str;

    /// All objects whose name starts with `prefix`, in the store's listing order.
    fn list(&self, prefix: &str) -> Result<Vec<BlobObject>, StorageError>;

    /// Create or overwrite `name` with `body`.
    fn upload(
        &self,
        name: &str,
        body: Vec<u8>,
        content_type: &str,
        acl: ObjectAcl,
    ) -> Result<(), StorageError>;
}
