//! Custom error types for the crate.
//!
//! `McsError` is the single error type returned by every public operation.
//! Variants that originate in the controller carry the raw [`ResultCode`]
//! exactly as the driver reported it, so callers can look it up in the vendor
//! documentation.
//!
//! ## Error Hierarchy
//!
//! - **`Discovery` / `NoSystemFound`**: locating a controller failed, or found nothing.
//! - **`Open` / `ChannelCount` / `Close`**: the driver rejected a session-level call.
//! - **`Lifecycle`**: the caller used a session in the wrong state (closed, or already open).
//! - **`Validation`**: command parameters were rejected before touching the hardware.
//! - **`Command`**: the controller rejected a motion command.
//! - **`StatusQuery`**: a status query failed while waiting for motion to finish.
//! - **`Timeout` / `Cancelled`**: the wait was abandoned by the caller's limits.
//! - **`Config` / `ConfigLoad`**: configuration problems.

use crate::transport::{ResultCode, SystemHandle};
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type McsResult<T> = std::result::Result<T, McsError>;

/// Error returned by every public operation.
#[derive(Error, Debug)]
pub enum McsError {
    /// `find_systems` returned a non-zero code.
    #[error("System discovery failed (code {code})")]
    Discovery { code: ResultCode },

    /// Discovery succeeded but listed no locator.
    #[error("No MCS system found")]
    NoSystemFound,

    /// The controller refused `open_system`.
    #[error("Failed to open system '{locator}' (code {code})")]
    Open { locator: String, code: ResultCode },

    /// Channel count query failed during open; the handle was released.
    #[error("Failed to read channel count (code {code})")]
    ChannelCount { code: ResultCode },

    /// Operation not allowed in the current session state.
    #[error("Session lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// `close_system` failed; the session is closed regardless.
    #[error("Closing system failed (code {code}); session is closed")]
    Close { code: ResultCode },

    /// Command rejected before reaching the controller.
    #[error("Invalid motion command: {0}")]
    Validation(#[from] ValidationError),

    /// The controller rejected a motion command. Not retried.
    #[error("Channel {channel} rejected motion command (code {code})")]
    Command { channel: u32, code: ResultCode },

    /// A status query failed while waiting for completion.
    #[error("Status query on channel {channel} failed (code {code})")]
    StatusQuery { channel: u32, code: ResultCode },

    /// The poller timeout expired; the channel was asked to stop.
    #[error("Channel {channel} still seeking target after {elapsed:?}")]
    Timeout { channel: u32, elapsed: Duration },

    /// The caller cancelled the wait; the channel was asked to stop.
    #[error("Motion on channel {channel} was cancelled")]
    Cancelled { channel: u32 },

    /// Invalid configuration value.
    #[error("Configuration validation error: {0}")]
    Config(String),

    /// TOML parse or extraction failure.
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] figment::Error),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Runtime(String),
}

impl McsError {
    /// The controller result code carried by this error, if any.
    pub fn hardware_code(&self) -> Option<ResultCode> {
        match self {
            McsError::Discovery { code }
            | McsError::Open { code, .. }
            | McsError::ChannelCount { code }
            | McsError::Close { code }
            | McsError::Command { code, .. }
            | McsError::StatusQuery { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Session used in a state that does not allow the operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("session is not open")]
    NotOpen,

    #[error("session is already open (handle {handle})")]
    AlreadyOpen { handle: SystemHandle },
}

/// Motion command parameters outside their accepted ranges.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("channel {channel} out of range (system has {count} channels)")]
    ChannelOutOfRange { channel: u32, count: u32 },

    #[error("channel index {0} is negative")]
    NegativeChannel(i64),

    #[error("channel index {0} does not fit a 32-bit channel number")]
    ChannelIndexTooLarge(i64),

    #[error("amplitude {0} outside [1, 4095]")]
    AmplitudeOutOfRange(u32),

    #[error("frequency {0} Hz outside [1, 20000]")]
    FrequencyOutOfRange(u32),
}
