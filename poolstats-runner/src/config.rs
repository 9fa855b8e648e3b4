//! Pipeline configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file (or no
//! file at all) yields the mainnet setup. Example:
//!
//! ```toml
//! http_timeout_secs = 600
//!
//! [paths]
//! data_dir = "data"
//! output_dir = "output"
//!
//! [snapshots]
//! bucket = "jito-mainnet"
//! preferred_warehouse = "ny-mainnet-warehouse-1"
//!
//! [publish]
//! bucket = "mrgn-public"
//! prefix = "stake_pool_data"
//! ```

use poolstats_core::chain::DEFAULT_RPC_ENDPOINT;
use poolstats_core::snapshot::{
    SelectionPolicy, DEFAULT_PREFERRED_WAREHOUSE, DEFAULT_SNAPSHOT_BUCKET,
    MIN_FULL_SNAPSHOT_BYTES,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GENESIS_URL: &str = "https://mainnet.rpc.jito.wtf/genesis.tar.bz2";
pub const DEFAULT_PUBLISH_BUCKET: &str = "mrgn-public";
pub const DEFAULT_PUBLISH_PREFIX: &str = "stake_pool_data";
pub const DEFAULT_TOKEN_ENV: &str = "GCS_ACCESS_TOKEN";
pub const METAS_GENERATOR: &str = "generate-metas";
pub const STATS_GENERATOR: &str = "generate-normalized-stats";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub rpc: RpcConfig,
    pub snapshots: SnapshotSourceConfig,
    pub publish: PublishConfig,
    pub generators: GeneratorConfig,
    /// Client timeout for RPC and storage calls. Unset means no timeout.
    pub http_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            rpc: RpcConfig::default(),
            snapshots: SnapshotSourceConfig::default(),
            publish: PublishConfig::default(),
            generators: GeneratorConfig::default(),
            http_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    pub fn selection_policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            preferred_warehouse: self.snapshots.preferred_warehouse.clone(),
            min_size_bytes: self.snapshots.min_size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Parent of the `epoch_<N>` workspaces.
    pub data_dir: PathBuf,
    /// Where meta and stats artifacts are written.
    pub output_dir: PathBuf,
    /// Directory holding the generator executables.
    pub generator_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            generator_dir: PathBuf::from("target/release"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub endpoint: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RPC_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSourceConfig {
    /// Public bucket the snapshots are listed from, read anonymously.
    pub bucket: String,
    pub preferred_warehouse: String,
    pub min_size_bytes: u64,
    pub genesis_url: String,
}

impl Default for SnapshotSourceConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_SNAPSHOT_BUCKET.to_string(),
            preferred_warehouse: DEFAULT_PREFERRED_WAREHOUSE.to_string(),
            min_size_bytes: MIN_FULL_SNAPSHOT_BYTES,
            genesis_url: DEFAULT_GENESIS_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub bucket: String,
    /// Object name prefix for stats and the manifest.
    pub prefix: String,
    /// Environment variable holding the upload bearer token.
    pub token_env: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_PUBLISH_BUCKET.to_string(),
            prefix: DEFAULT_PUBLISH_PREFIX.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub metas_binary: String,
    pub stats_binary: String,
    /// `RUST_LOG` passed to the generators.
    pub log_level: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            metas_binary: METAS_GENERATOR.to_string(),
            stats_binary: STATS_GENERATOR.to_string(),
            log_level: "error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_mainnet_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.rpc.endpoint, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.snapshots.bucket, "jito-mainnet");
        assert_eq!(config.snapshots.min_size_bytes, 10_000_000_000);
        assert_eq!(config.publish.prefix, "stake_pool_data");
        assert_eq!(config.generators.log_level, "error");
        assert_eq!(config.http_timeout(), None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            http_timeout_secs = 120

            [paths]
            data_dir = "/srv/ledger"

            [snapshots]
            preferred_warehouse = "ams-mainnet-warehouse-1"
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.data_dir, PathBuf::from("/srv/ledger"));
        assert_eq!(config.paths.output_dir, PathBuf::from("output"));
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(120)));

        let policy = config.selection_policy();
        assert_eq!(policy.preferred_warehouse, "ams-mainnet-warehouse-1");
        assert_eq!(policy.min_size_bytes, MIN_FULL_SNAPSHOT_BYTES);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            PipelineConfig::from_toml("[paths\ndata_dir = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/poolstats.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
