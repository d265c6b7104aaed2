//! Tracing subscriber initialization.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `config.filter`.
///
/// Returns `false` if a global subscriber was already installed, which is
/// expected when an embedding application sets up its own tracing.
pub fn init(config: &LoggingConfig) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
