//! Transport boundary to the controller driver.
//!
//! [`McsTransport`] is the full set of driver primitives the session needs.
//! Every primitive returns either its payload or the non-zero [`ResultCode`]
//! reported by the driver, unmodified.
//!
//! Implementations:
//! - [`SimulatedTransport`] - in-process controller model with realistic timing
//! - [`ScriptedTransport`] - scripted responses and call recording, for tests
//! - `NativeTransport` - the `MCSControl` library (feature `mcs_hardware`)

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "mcs_hardware")]
pub mod native;
pub mod scripted;
pub mod simulated;

#[cfg(feature = "mcs_hardware")]
pub use native::NativeTransport;
pub use scripted::{ScriptedTransport, TransportCall};
pub use simulated::SimulatedTransport;

/// Status value reported while a channel is still moving towards its target.
pub const TARGET_STATUS: u32 = mcs_sys::SA_TARGET_STATUS;
/// Status value of a stopped channel.
pub const STOPPED_STATUS: u32 = mcs_sys::SA_STOPPED_STATUS;
/// Mode string passed to `open_system`.
pub const SYNC_MODE: &str = "sync";

/// Non-zero result code returned by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    /// Turn a raw driver return value into `Ok(())` for zero, `Err` otherwise.
    pub fn check(raw: u32) -> TransportResult<()> {
        if raw == mcs_sys::SA_OK {
            Ok(())
        } else {
            Err(ResultCode(raw))
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque system index assigned by the driver when a system is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemHandle(pub u32);

impl fmt::Display for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a single driver primitive.
pub type TransportResult<T> = std::result::Result<T, ResultCode>;

/// Driver primitives used by the session, dispatcher and poller.
///
/// Methods take `&self`: the driver is reentrant per channel, so several
/// threads may issue commands on different channels of one system.
pub trait McsTransport: Send + Sync {
    /// Newline-separated list of system locators.
    fn find_systems(&self) -> TransportResult<String>;

    /// Open the system at `locator`; `mode` is the driver option string.
    fn open_system(&self, locator: &str, mode: &str) -> TransportResult<SystemHandle>;

    /// Release a handle returned by `open_system`.
    fn close_system(&self, handle: SystemHandle) -> TransportResult<()>;

    /// Number of positioner channels on the open system.
    fn channel_count(&self, handle: SystemHandle) -> TransportResult<u32>;

    /// Move by `delta_nm` nanometers relative to the current position.
    fn issue_relative_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        delta_nm: i32,
    ) -> TransportResult<()>;

    /// Open-loop burst of `steps` at the given amplitude and frequency.
    fn issue_step_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    ) -> TransportResult<()>;

    /// Raw status code of one channel.
    fn query_status(&self, handle: SystemHandle, channel: u32) -> TransportResult<u32>;

    /// Abort any motion on the channel. Used after a timeout or cancellation.
    fn stop(&self, handle: SystemHandle, channel: u32) -> TransportResult<()>;
}

impl<T: McsTransport + ?Sized> McsTransport for Arc<T> {
    fn find_systems(&self) -> TransportResult<String> {
        (**self).find_systems()
    }

    fn open_system(&self, locator: &str, mode: &str) -> TransportResult<SystemHandle> {
        (**self).open_system(locator, mode)
    }

    fn close_system(&self, handle: SystemHandle) -> TransportResult<()> {
        (**self).close_system(handle)
    }

    fn channel_count(&self, handle: SystemHandle) -> TransportResult<u32> {
        (**self).channel_count(handle)
    }

    fn issue_relative_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        delta_nm: i32,
    ) -> TransportResult<()> {
        (**self).issue_relative_move(handle, channel, delta_nm)
    }

    fn issue_step_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    ) -> TransportResult<()> {
        (**self).issue_step_move(handle, channel, steps, amplitude, frequency)
    }

    fn query_status(&self, handle: SystemHandle, channel: u32) -> TransportResult<u32> {
        (**self).query_status(handle, channel)
    }

    fn stop(&self, handle: SystemHandle, channel: u32) -> TransportResult<()> {
        (**self).stop(handle, channel)
    }
}
