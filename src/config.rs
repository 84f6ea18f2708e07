//! Configuration using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. TOML file (default: `config/mcs.toml`; a missing file is not an error)
//! 3. Environment variables prefixed with `MCS_`, nested keys split on `__`
//!
//! # Environment Variable Overrides
//!
//! ```text
//! MCS_APPLICATION__LOG_LEVEL=debug
//! MCS_SESSION__LOCATOR="usb:id:3118167233"
//! MCS_POLLING__INTERVAL_MS=20
//! MCS_POLLING__TIMEOUT_MS=30000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mcs_stage::config::McsConfig;
//!
//! let config = McsConfig::load()?;
//! println!("Poll interval: {} ms", config.polling.interval_ms);
//! # Ok::<(), mcs_stage::error::McsError>(())
//! ```

use crate::error::{McsError, McsResult};
use crate::poller::{CompletionPoller, MIN_POLL_INTERVAL};
use crate::validate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/mcs.toml";
/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "MCS_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McsConfig {
    pub application: ApplicationConfig,
    pub session: SessionConfig,
    pub polling: PollingConfig,
    pub motion: MotionDefaults,
    pub simulation: SimulationConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "mcs".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed locator (e.g. "usb:id:3118167233"); discovery is used when unset.
    pub locator: Option<String>,
}

/// Completion poller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Abandon a wait after this long; unset waits indefinitely.
    pub timeout_ms: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            timeout_ms: None,
        }
    }
}

/// Step parameters used when a command does not specify them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDefaults {
    pub default_amplitude: u32,
    pub default_frequency: u32,
}

impl Default for MotionDefaults {
    fn default() -> Self {
        Self {
            default_amplitude: 4095,
            default_frequency: 2000,
        }
    }
}

/// Simulated controller settings (used with `--simulate`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub locator: String,
    pub channels: u32,
    pub nm_per_second: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            locator: "usb:id:sim".to_string(),
            channels: 3,
            nm_per_second: crate::transport::simulated::DEFAULT_NM_PER_SECOND,
        }
    }
}

impl McsConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> McsResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific TOML file and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> McsResult<Self> {
        let config: McsConfig = Figment::from(Serialized::defaults(McsConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks that parsing cannot express.
    pub fn validate(&self) -> McsResult<()> {
        let level = self.application.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(McsError::Config(format!(
                "log_level '{}' must be one of {:?}",
                self.application.log_level, LOG_LEVELS
            )));
        }

        if Duration::from_millis(self.polling.interval_ms) < MIN_POLL_INTERVAL {
            return Err(McsError::Config(format!(
                "polling.interval_ms {} is below the minimum of {} ms",
                self.polling.interval_ms,
                MIN_POLL_INTERVAL.as_millis()
            )));
        }
        if self.polling.timeout_ms == Some(0) {
            return Err(McsError::Config(
                "polling.timeout_ms must be positive when set".to_string(),
            ));
        }

        validate::amplitude(self.motion.default_amplitude)?;
        validate::frequency(self.motion.default_frequency)?;

        if self.session.locator.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(McsError::Config("session.locator is empty".to_string()));
        }

        if self.simulation.channels == 0 {
            return Err(McsError::Config(
                "simulation.channels must be at least 1".to_string(),
            ));
        }
        if !(self.simulation.nm_per_second.is_finite() && self.simulation.nm_per_second > 0.0) {
            return Err(McsError::Config(
                "simulation.nm_per_second must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Completion poller built from the polling section.
    pub fn poller(&self) -> McsResult<CompletionPoller> {
        let poller = CompletionPoller::new(Duration::from_millis(self.polling.interval_ms))?;
        Ok(match self.polling.timeout_ms {
            Some(ms) => poller.with_timeout(Duration::from_millis(ms)),
            None => poller,
        })
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> McsResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| McsError::Config(format!("failed to serialize configuration: {}", e)))
    }
}
