//! Simulated MCS controller.
//!
//! Models a single controller with a fixed number of positioner channels.
//! Motion takes real time, so the completion poller sees the channel in
//! target-seeking state for a while before it reports stopped:
//!
//! - Step moves: `|steps| / frequency` seconds
//! - Relative moves: `|delta_nm| / nm_per_second` seconds
//!
//! Both are capped at [`MAX_SIMULATED_MOVE`] so a typo cannot hang a demo.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = SimulatedTransport::new("usb:id:0001", 3);
//! let mut session = Session::new(transport);
//! session.open()?;
//! session.step_move(1, 200, 4095, 2000)?; // ~100ms
//! ```

use super::{
    McsTransport, ResultCode, SystemHandle, TransportResult, STOPPED_STATUS, TARGET_STATUS,
};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Upper bound on the simulated duration of one move.
pub const MAX_SIMULATED_MOVE: Duration = Duration::from_secs(5);

/// Default simulated closed-loop speed.
pub const DEFAULT_NM_PER_SECOND: f64 = 1_000_000.0;

#[derive(Debug, Default, Clone)]
struct SimChannel {
    position_nm: i64,
    step_count: i64,
    busy_until: Option<Instant>,
}

impl SimChannel {
    fn is_busy(&self, now: Instant) -> bool {
        self.busy_until.is_some_and(|deadline| deadline > now)
    }
}

struct SimState {
    open: Option<SystemHandle>,
    next_handle: u32,
    channels: Vec<SimChannel>,
}

/// In-process stand-in for an MCS controller.
pub struct SimulatedTransport {
    locator: String,
    nm_per_second: f64,
    state: Mutex<SimState>,
}

impl SimulatedTransport {
    /// Create a controller reachable at `locator` with `channels` positioners.
    pub fn new(locator: &str, channels: u32) -> Self {
        Self::with_speed(locator, channels, DEFAULT_NM_PER_SECOND)
    }

    /// Create a controller with a custom closed-loop speed.
    pub fn with_speed(locator: &str, channels: u32, nm_per_second: f64) -> Self {
        Self {
            locator: locator.to_string(),
            nm_per_second,
            state: Mutex::new(SimState {
                open: None,
                next_handle: 0,
                channels: vec![SimChannel::default(); channels as usize],
            }),
        }
    }

    /// Current simulated position of a channel in nanometers.
    pub fn position_nm(&self, channel: u32) -> Option<i64> {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .map(|c| c.position_nm)
    }

    /// Net number of steps performed on a channel.
    pub fn step_count(&self, channel: u32) -> Option<i64> {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .map(|c| c.step_count)
    }

    fn with_channel<R>(
        &self,
        handle: SystemHandle,
        channel: u32,
        f: impl FnOnce(&mut SimChannel) -> R,
    ) -> TransportResult<R> {
        let mut state = self.state.lock();
        if state.open != Some(handle) {
            return Err(ResultCode(mcs_sys::SA_INVALID_SYSTEM_INDEX_ERROR));
        }
        let ch = state
            .channels
            .get_mut(channel as usize)
            .ok_or(ResultCode(mcs_sys::SA_INVALID_CHANNEL_INDEX_ERROR))?;
        Ok(f(ch))
    }

    fn travel_time(seconds: f64) -> Duration {
        if !seconds.is_finite() || seconds >= MAX_SIMULATED_MOVE.as_secs_f64() {
            return MAX_SIMULATED_MOVE;
        }
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

impl McsTransport for SimulatedTransport {
    fn find_systems(&self) -> TransportResult<String> {
        Ok(self.locator.clone())
    }

    fn open_system(&self, locator: &str, mode: &str) -> TransportResult<SystemHandle> {
        if locator != self.locator {
            return Err(ResultCode(mcs_sys::SA_INVALID_SYSTEM_LOCATOR_ERROR));
        }
        if mode != super::SYNC_MODE {
            return Err(ResultCode(mcs_sys::SA_WRONG_MODE_ERROR));
        }
        let mut state = self.state.lock();
        if state.open.is_some() {
            return Err(ResultCode(mcs_sys::SA_TOO_MANY_SYSTEMS_ERROR));
        }
        let handle = SystemHandle(state.next_handle);
        state.next_handle += 1;
        state.open = Some(handle);
        Ok(handle)
    }

    fn close_system(&self, handle: SystemHandle) -> TransportResult<()> {
        let mut state = self.state.lock();
        if state.open != Some(handle) {
            return Err(ResultCode(mcs_sys::SA_INVALID_SYSTEM_INDEX_ERROR));
        }
        state.open = None;
        for channel in &mut state.channels {
            channel.busy_until = None;
        }
        Ok(())
    }

    fn channel_count(&self, handle: SystemHandle) -> TransportResult<u32> {
        let state = self.state.lock();
        if state.open != Some(handle) {
            return Err(ResultCode(mcs_sys::SA_INVALID_SYSTEM_INDEX_ERROR));
        }
        Ok(state.channels.len() as u32)
    }

    fn issue_relative_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        delta_nm: i32,
    ) -> TransportResult<()> {
        let travel = Self::travel_time(f64::from(delta_nm).abs() / self.nm_per_second);
        self.with_channel(handle, channel, |ch| {
            ch.position_nm += i64::from(delta_nm);
            ch.busy_until = Some(Instant::now() + travel);
        })
    }

    fn issue_step_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    ) -> TransportResult<()> {
        if amplitude == 0 || frequency == 0 {
            return Err(ResultCode(mcs_sys::SA_INVALID_PARAMETER_ERROR));
        }
        let travel = Self::travel_time(f64::from(steps).abs() / f64::from(frequency));
        self.with_channel(handle, channel, |ch| {
            ch.step_count += i64::from(steps);
            ch.busy_until = Some(Instant::now() + travel);
        })
    }

    fn query_status(&self, handle: SystemHandle, channel: u32) -> TransportResult<u32> {
        let now = Instant::now();
        self.with_channel(handle, channel, |ch| {
            if ch.is_busy(now) {
                TARGET_STATUS
            } else {
                ch.busy_until = None;
                STOPPED_STATUS
            }
        })
    }

    fn stop(&self, handle: SystemHandle, channel: u32) -> TransportResult<()> {
        self.with_channel(handle, channel, |ch| ch.busy_until = None)
    }
}
