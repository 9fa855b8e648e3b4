//! poolstats runner: drives the epoch pipeline.
//!
//! - Configuration loading (TOML)
//! - Epoch preparation: workspace, genesis, snapshot download
//! - Generator invocation and per-epoch orchestration
//! - Stats publishing and the manifest

pub mod config;
pub mod generator;
pub mod manifest;
pub mod pipeline;
pub mod prepare;

pub use config::{ConfigError, PipelineConfig};
pub use generator::{Generator, GeneratorError, GeneratorInvoker, MetasRequest, Stage, StatsRequest};
pub use manifest::{build_manifest, Manifest, ManifestPublisher, PublishError, PublishReport};
pub use pipeline::{
    uses_live_price_fallback, BatchSummary, EpochRun, PipelineError, PipelineOrchestrator,
    PipelineSettings, Services, SkipReason,
};
pub use prepare::{prepare_epoch, PreparedEpoch};
