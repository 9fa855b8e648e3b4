//! Domain types for the epoch pipeline

pub mod ids;
pub mod names;

pub use ids::{Epoch, Slot, MIN_SUPPORTED_EPOCH};
pub use names::{
    epoch_dir_name, metas_file_name, parse_epoch_dir, parse_metas_file, parse_stats_file,
    stats_file_name, MANIFEST_FILE_NAME,
};
