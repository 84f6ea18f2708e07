//! Completion poller.
//!
//! The controller only exposes a level-triggered "still seeking target"
//! status, so completion is detected by re-querying the channel at a fixed
//! interval until the status changes:
//!
//! ```text
//!            query ok, TargetSeeking (sleep interval)
//!              +-----+
//!              v     |
//!   start -> Seeking -+-- query ok, any other status --> Done
//!              |
//!              +-- query failed ----------------------> Failed(code)
//!              +-- timeout elapsed -------------------> TimedOut
//!              +-- token cancelled -------------------> Cancelled
//! ```
//!
//! Failed queries are terminal and never retried. There is no backoff: the
//! duration of a move cannot be predicted from its parameters.

use crate::error::{McsError, McsResult};
use crate::motion::MotionStatus;
use crate::transport::{McsTransport, ResultCode, SystemHandle, TransportResult};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default time between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Smallest accepted interval; anything shorter is a busy-spin on the bus.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// State of one polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Seeking,
    Done,
    Failed(ResultCode),
    TimedOut,
    Cancelled,
}

impl PollState {
    /// Transition taken on a status query result.
    pub fn on_query(result: TransportResult<u32>) -> Self {
        match result {
            Err(code) => PollState::Failed(code),
            Ok(raw) if MotionStatus::from_raw(raw).is_seeking() => PollState::Seeking,
            Ok(_) => PollState::Done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Seeking)
    }
}

/// Summary of a finished polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub state: PollState,
    /// Status queries issued, including a failed one.
    pub queries: u32,
    /// Interval sleeps taken.
    pub waits: u32,
    pub elapsed: Duration,
}

/// Report of a completed motion command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub channel: u32,
    pub status_queries: u32,
    pub waits: u32,
    pub elapsed: Duration,
}

impl PollOutcome {
    /// Map the terminal state onto the crate result type.
    pub fn into_result(self, channel: u32) -> McsResult<Completion> {
        match self.state {
            PollState::Done => Ok(Completion {
                channel,
                status_queries: self.queries,
                waits: self.waits,
                elapsed: self.elapsed,
            }),
            PollState::Failed(code) => Err(McsError::StatusQuery { channel, code }),
            PollState::TimedOut => Err(McsError::Timeout {
                channel,
                elapsed: self.elapsed,
            }),
            PollState::Cancelled => Err(McsError::Cancelled { channel }),
            // wait() never returns a non-terminal state
            PollState::Seeking => Err(McsError::Runtime(format!(
                "poller for channel {} stopped while seeking",
                channel
            ))),
        }
    }
}

/// Blocks until a channel leaves the target-seeking state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Default for CompletionPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl CompletionPoller {
    /// Poller with a custom interval and no timeout.
    ///
    /// # Errors
    /// `McsError::Config` if `interval` is below [`MIN_POLL_INTERVAL`].
    pub fn new(interval: Duration) -> McsResult<Self> {
        if interval < MIN_POLL_INTERVAL {
            return Err(McsError::Config(format!(
                "poll interval {:?} is below the minimum of {:?}",
                interval, MIN_POLL_INTERVAL
            )));
        }
        Ok(Self {
            interval,
            timeout: None,
        })
    }

    /// Give up with `TimedOut` once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Poll `channel` until it reaches a terminal state.
    ///
    /// The token, if given, is checked before every sleep. On timeout or
    /// cancellation the channel is stopped; a failing stop is only logged.
    pub fn wait<T: McsTransport + ?Sized>(
        &self,
        transport: &T,
        handle: SystemHandle,
        channel: u32,
        cancel: Option<&CancellationToken>,
    ) -> PollOutcome {
        let started = Instant::now();
        let mut queries = 0;
        let mut waits = 0;

        let state = loop {
            let result = transport.query_status(handle, channel);
            queries += 1;
            trace!(channel, ?result, queries, "status query");

            let state = PollState::on_query(result);
            if state.is_terminal() {
                break state;
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                break PollState::Cancelled;
            }
            if let Some(limit) = self.timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    break PollState::TimedOut;
                }
                std::thread::sleep(self.interval.min(limit - elapsed));
            } else {
                std::thread::sleep(self.interval);
            }
            waits += 1;
        };

        if matches!(state, PollState::TimedOut | PollState::Cancelled) {
            if let Err(code) = transport.stop(handle, channel) {
                warn!(channel, %code, "Failed to stop channel after abandoning wait");
            }
        }

        let elapsed = started.elapsed();
        debug!(channel, ?state, queries, waits, ?elapsed, "Polling finished");
        PollOutcome {
            state,
            queries,
            waits,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedTransport, TransportCall, STOPPED_STATUS, TARGET_STATUS};

    fn fast_poller() -> CompletionPoller {
        CompletionPoller::new(MIN_POLL_INTERVAL).unwrap()
    }

    #[test]
    fn test_transitions() {
        assert_eq!(PollState::on_query(Ok(TARGET_STATUS)), PollState::Seeking);
        assert_eq!(PollState::on_query(Ok(STOPPED_STATUS)), PollState::Done);
        assert_eq!(PollState::on_query(Ok(7)), PollState::Done);
        assert_eq!(
            PollState::on_query(Err(ResultCode(10))),
            PollState::Failed(ResultCode(10))
        );
    }

    #[test]
    fn test_interval_lower_bound() {
        assert!(CompletionPoller::new(Duration::from_millis(1)).is_err());
        assert!(CompletionPoller::new(Duration::ZERO).is_err());
        assert_eq!(
            CompletionPoller::new(MIN_POLL_INTERVAL).unwrap().interval(),
            MIN_POLL_INTERVAL
        );
        assert_eq!(CompletionPoller::default().interval(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_immediate_done_never_waits() {
        let transport = ScriptedTransport::new("usb:0", 1);
        let outcome = fast_poller().wait(&transport, SystemHandle(0), 0, None);

        assert_eq!(outcome.state, PollState::Done);
        assert_eq!(outcome.queries, 1);
        assert_eq!(outcome.waits, 0);
    }

    #[test]
    fn test_n_seeking_then_idle() {
        for n in [1u32, 2, 5] {
            let transport = ScriptedTransport::new("usb:0", 1);
            transport.push_statuses(0, (0..n).map(|_| TARGET_STATUS));

            let outcome = fast_poller().wait(&transport, SystemHandle(0), 0, None);
            assert_eq!(outcome.state, PollState::Done);
            assert_eq!(outcome.queries, n + 1);
            assert_eq!(outcome.waits, n);
            assert_eq!(transport.status_queries(0), (n + 1) as usize);
        }
    }

    #[test]
    fn test_unknown_status_counts_as_done() {
        let transport = ScriptedTransport::new("usb:0", 1);
        transport.push_statuses(0, [TARGET_STATUS, mcs_sys::SA_HOLDING_STATUS]);

        let outcome = fast_poller().wait(&transport, SystemHandle(0), 0, None);
        assert_eq!(outcome.state, PollState::Done);
        assert_eq!(outcome.queries, 2);
    }

    #[test]
    fn test_failure_on_third_query_preserves_code() {
        let transport = ScriptedTransport::new("usb:0", 1);
        transport.push_statuses(0, [TARGET_STATUS, TARGET_STATUS]);
        transport.push_status_error(0, 0xDEAD);
        transport.push_statuses(0, [STOPPED_STATUS]);

        let outcome = fast_poller().wait(&transport, SystemHandle(0), 0, None);
        assert_eq!(outcome.state, PollState::Failed(ResultCode(0xDEAD)));
        assert_eq!(outcome.queries, 3);
        // Not retried after the failure
        assert_eq!(transport.status_queries(0), 3);

        let err = outcome.into_result(0).unwrap_err();
        assert_eq!(err.hardware_code(), Some(ResultCode(0xDEAD)));
    }

    #[test]
    fn test_timeout_is_distinct_and_stops_channel() {
        let transport = ScriptedTransport::new("usb:0", 2);
        transport.hold_seeking(1);

        let poller = fast_poller().with_timeout(Duration::from_millis(30));
        let outcome = poller.wait(&transport, SystemHandle(0), 1, None);

        assert_eq!(outcome.state, PollState::TimedOut);
        assert!(outcome.elapsed >= Duration::from_millis(30));
        assert!(transport
            .calls()
            .contains(&TransportCall::Stop { channel: 1 }));
        assert!(matches!(
            outcome.into_result(1),
            Err(McsError::Timeout { channel: 1, .. })
        ));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_failed_stop_after_timeout_keeps_timeout_error() {
        let transport = ScriptedTransport::new("usb:0", 1).fail_stop(7);
        transport.hold_seeking(0);

        let poller = fast_poller().with_timeout(Duration::from_millis(20));
        let outcome = poller.wait(&transport, SystemHandle(0), 0, None);

        assert_eq!(outcome.state, PollState::TimedOut);
        assert!(transport
            .calls()
            .contains(&TransportCall::Stop { channel: 0 }));
        assert!(logs_contain("Failed to stop channel"));
        assert!(matches!(
            outcome.into_result(0),
            Err(McsError::Timeout { channel: 0, .. })
        ));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_failed_stop_after_cancel_keeps_cancelled_error() {
        let transport = ScriptedTransport::new("usb:0", 1).fail_stop(7);
        transport.hold_seeking(0);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = fast_poller().wait(&transport, SystemHandle(0), 0, Some(&token));

        assert_eq!(outcome.state, PollState::Cancelled);
        assert_eq!(
            transport
                .calls()
                .iter()
                .filter(|c| matches!(c, TransportCall::Stop { channel: 0 }))
                .count(),
            1
        );
        assert!(logs_contain("Failed to stop channel"));
        assert!(logs_contain("code=7"));
        assert!(matches!(
            outcome.into_result(0),
            Err(McsError::Cancelled { channel: 0 })
        ));
    }

    #[test]
    fn test_cancelled_before_first_wait() {
        let transport = ScriptedTransport::new("usb:0", 1);
        transport.hold_seeking(0);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = fast_poller().wait(&transport, SystemHandle(0), 0, Some(&token));
        assert_eq!(outcome.state, PollState::Cancelled);
        assert_eq!(outcome.queries, 1);
        assert_eq!(outcome.waits, 0);
        assert!(matches!(
            outcome.into_result(0),
            Err(McsError::Cancelled { channel: 0 })
        ));
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let transport = ScriptedTransport::new("usb:0", 1);
        transport.hold_seeking(0);
        let token = CancellationToken::new();

        let outcome = std::thread::scope(|s| {
            let canceller = token.clone();
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                canceller.cancel();
            });
            fast_poller().wait(&transport, SystemHandle(0), 0, Some(&token))
        });

        assert_eq!(outcome.state, PollState::Cancelled);
        assert!(outcome.waits >= 1);
    }
}
