//! Tracing setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and `warn` to everything else.

use crate::config::McsConfig;
use crate::error::{McsError, McsResult};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(log_level: &str) -> McsResult<EnvFilter> {
    EnvFilter::try_new(format!("warn,mcs_stage={},mcs={}", log_level, log_level))
        .map_err(|e| McsError::Config(format!("invalid log level '{}': {}", log_level, e)))
}

/// Install the global fmt subscriber.
///
/// # Errors
/// Fails if the level is invalid or a global subscriber is already set.
pub fn init(config: &McsConfig) -> McsResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.application.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| McsError::Config(format!("failed to install tracing subscriber: {}", e)))
}
