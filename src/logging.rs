use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{AnnError, Result};

/// Install the global tracing subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    installed.map_err(|e| AnnError::Config(format!("failed to install subscriber: {e}")))?;
    tracing::info!(level = %config.level, format = %config.format, "logging initialized");
    Ok(())
}
