//! Scripted transport for tests.
//!
//! Responses are configured up front and every call is recorded, so tests can
//! assert both the outcome of an operation and exactly which driver
//! primitives it touched.
//!
//! Status queries consume a per-channel queue of scripted responses. Once a
//! channel's queue is empty it reports [`STOPPED_STATUS`], unless the channel
//! was marked with [`ScriptedTransport::hold_seeking`], in which case it keeps
//! reporting [`TARGET_STATUS`] until stopped.
//!
//! ```rust,ignore
//! let transport = ScriptedTransport::new("usb:0", 3);
//! transport.push_statuses(1, [TARGET_STATUS, TARGET_STATUS, STOPPED_STATUS]);
//! ```

use super::{
    McsTransport, ResultCode, SystemHandle, TransportResult, STOPPED_STATUS, TARGET_STATUS,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    FindSystems,
    OpenSystem { locator: String, mode: String },
    CloseSystem { handle: SystemHandle },
    ChannelCount { handle: SystemHandle },
    RelativeMove { channel: u32, delta_nm: i32 },
    StepMove {
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    },
    QueryStatus { channel: u32 },
    Stop { channel: u32 },
}

impl TransportCall {
    /// True for the motion primitives (relative and step moves).
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            TransportCall::RelativeMove { .. } | TransportCall::StepMove { .. }
        )
    }
}

struct Script {
    locators: TransportResult<String>,
    open_error: Option<ResultCode>,
    next_handle: u32,
    channel_count: TransportResult<u32>,
    close_error: Option<ResultCode>,
    stop_error: Option<ResultCode>,
    command_error: Option<ResultCode>,
    statuses: HashMap<u32, VecDeque<TransportResult<u32>>>,
    held: HashSet<u32>,
    calls: Vec<TransportCall>,
}

/// Transport double with scripted responses.
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    /// A transport that discovers `locator` and reports `channels` channels.
    pub fn new(locator: &str, channels: u32) -> Self {
        Self {
            script: Mutex::new(Script {
                locators: Ok(locator.to_string()),
                open_error: None,
                next_handle: 0,
                channel_count: Ok(channels),
                close_error: None,
                stop_error: None,
                command_error: None,
                statuses: HashMap::new(),
                held: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Discovery returns this raw locator list.
    pub fn with_locators(self, locators: &str) -> Self {
        self.script.lock().locators = Ok(locators.to_string());
        self
    }

    pub fn fail_discovery(self, code: u32) -> Self {
        self.script.lock().locators = Err(ResultCode(code));
        self
    }

    pub fn fail_open(self, code: u32) -> Self {
        self.script.lock().open_error = Some(ResultCode(code));
        self
    }

    pub fn fail_channel_count(self, code: u32) -> Self {
        self.script.lock().channel_count = Err(ResultCode(code));
        self
    }

    pub fn fail_close(self, code: u32) -> Self {
        self.script.lock().close_error = Some(ResultCode(code));
        self
    }

    /// `stop` fails with `code` and leaves held channels seeking.
    pub fn fail_stop(self, code: u32) -> Self {
        self.script.lock().stop_error = Some(ResultCode(code));
        self
    }

    /// Every motion command is rejected with `code`.
    pub fn reject_commands(self, code: u32) -> Self {
        self.script.lock().command_error = Some(ResultCode(code));
        self
    }

    /// Queue raw status values for a channel.
    pub fn push_statuses(&self, channel: u32, statuses: impl IntoIterator<Item = u32>) {
        let mut script = self.script.lock();
        let queue = script.statuses.entry(channel).or_default();
        queue.extend(statuses.into_iter().map(Ok));
    }

    /// Queue a failing status query for a channel.
    pub fn push_status_error(&self, channel: u32, code: u32) {
        let mut script = self.script.lock();
        let queue = script.statuses.entry(channel).or_default();
        queue.push_back(Err(ResultCode(code)));
    }

    /// Keep reporting target-seeking once the queue runs dry, until `stop`.
    pub fn hold_seeking(&self, channel: u32) {
        self.script.lock().held.insert(channel);
    }

    /// Snapshot of every call made so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.script.lock().calls.clone()
    }

    /// Number of motion primitives invoked.
    pub fn motion_calls(&self) -> usize {
        self.script.lock().calls.iter().filter(|c| c.is_motion()).count()
    }

    /// Number of status queries made on `channel`.
    pub fn status_queries(&self, channel: u32) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TransportCall::QueryStatus { channel: ch } if *ch == channel))
            .count()
    }

    fn record(&self, call: TransportCall) {
        self.script.lock().calls.push(call);
    }
}

impl McsTransport for ScriptedTransport {
    fn find_systems(&self) -> TransportResult<String> {
        self.record(TransportCall::FindSystems);
        self.script.lock().locators.clone()
    }

    fn open_system(&self, locator: &str, mode: &str) -> TransportResult<SystemHandle> {
        self.record(TransportCall::OpenSystem {
            locator: locator.to_string(),
            mode: mode.to_string(),
        });
        let mut script = self.script.lock();
        if let Some(code) = script.open_error {
            return Err(code);
        }
        let handle = SystemHandle(script.next_handle);
        script.next_handle += 1;
        Ok(handle)
    }

    fn close_system(&self, handle: SystemHandle) -> TransportResult<()> {
        self.record(TransportCall::CloseSystem { handle });
        match self.script.lock().close_error {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn channel_count(&self, handle: SystemHandle) -> TransportResult<u32> {
        self.record(TransportCall::ChannelCount { handle });
        self.script.lock().channel_count
    }

    fn issue_relative_move(
        &self,
        _handle: SystemHandle,
        channel: u32,
        delta_nm: i32,
    ) -> TransportResult<()> {
        self.record(TransportCall::RelativeMove { channel, delta_nm });
        match self.script.lock().command_error {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn issue_step_move(
        &self,
        _handle: SystemHandle,
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    ) -> TransportResult<()> {
        self.record(TransportCall::StepMove {
            channel,
            steps,
            amplitude,
            frequency,
        });
        match self.script.lock().command_error {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn query_status(&self, _handle: SystemHandle, channel: u32) -> TransportResult<u32> {
        self.record(TransportCall::QueryStatus { channel });
        let mut script = self.script.lock();
        if let Some(next) = script.statuses.get_mut(&channel).and_then(VecDeque::pop_front) {
            return next;
        }
        if script.held.contains(&channel) {
            Ok(TARGET_STATUS)
        } else {
            Ok(STOPPED_STATUS)
        }
    }

    fn stop(&self, _handle: SystemHandle, channel: u32) -> TransportResult<()> {
        self.record(TransportCall::Stop { channel });
        let mut script = self.script.lock();
        if let Some(code) = script.stop_error {
            return Err(code);
        }
        script.held.remove(&channel);
        Ok(())
    }
}
