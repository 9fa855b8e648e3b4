use tracing_subscriber::{prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_env_filter() -> &'static str {
    "info"
}

/// Returns an [`EnvFilter`] from `RUST_LOG`, or `default` when unset or unparsable.
pub fn get_env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Console logging to stderr, keeping stdout for command summaries.
pub fn setup_logger() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter())),
        )
        .init();
}
