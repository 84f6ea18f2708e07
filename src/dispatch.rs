//! Channel command dispatcher.
//!
//! Validates a [`MotionCommand`] against the open session, forwards it to the
//! matching transport primitive, then blocks in the [`CompletionPoller`] until
//! the channel has finished moving. A rejected command is returned as-is and
//! never reissued: step counts are not idempotent.

use crate::error::{McsError, McsResult};
use crate::motion::MotionCommand;
use crate::poller::{Completion, CompletionPoller};
use crate::transport::{McsTransport, SystemHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Dispatcher bound to one open session.
///
/// Obtained from [`Session::dispatcher`](crate::session::Session::dispatcher);
/// borrowing the session keeps it open for the dispatcher's lifetime.
pub struct Dispatcher<'s, T: McsTransport> {
    transport: &'s T,
    handle: SystemHandle,
    channel_count: u32,
    poller: &'s CompletionPoller,
}

impl<'s, T: McsTransport> Dispatcher<'s, T> {
    pub(crate) fn new(
        transport: &'s T,
        handle: SystemHandle,
        channel_count: u32,
        poller: &'s CompletionPoller,
    ) -> Self {
        Self {
            transport,
            handle,
            channel_count,
            poller,
        }
    }

    /// Issue `command` and block until the channel stops moving.
    pub fn dispatch(&self, command: &MotionCommand) -> McsResult<Completion> {
        self.run(command, None)
    }

    /// Like [`dispatch`](Self::dispatch), abandoning the wait when `cancel` fires.
    pub fn dispatch_with_cancel(
        &self,
        command: &MotionCommand,
        cancel: &CancellationToken,
    ) -> McsResult<Completion> {
        self.run(command, Some(cancel))
    }

    fn run(
        &self,
        command: &MotionCommand,
        cancel: Option<&CancellationToken>,
    ) -> McsResult<Completion> {
        command.validate(self.channel_count)?;
        let channel = command.channel();

        debug!(handle = %self.handle, %command, "Issuing motion command");
        let issued = match *command {
            MotionCommand::RelativeMove { channel, delta_nm } => {
                self.transport
                    .issue_relative_move(self.handle, channel, delta_nm)
            }
            MotionCommand::StepMove {
                channel,
                steps,
                amplitude,
                frequency,
            } => self
                .transport
                .issue_step_move(self.handle, channel, steps, amplitude, frequency),
        };
        issued.map_err(|code| McsError::Command { channel, code })?;

        let completion = self
            .poller
            .wait(self.transport, self.handle, channel, cancel)
            .into_result(channel)?;

        info!(
            %command,
            queries = completion.status_queries,
            elapsed_ms = completion.elapsed.as_millis() as u64,
            "Motion completed"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::poller::MIN_POLL_INTERVAL;
    use crate::transport::{ResultCode, ScriptedTransport, TransportCall, TARGET_STATUS};

    fn poller() -> CompletionPoller {
        CompletionPoller::new(MIN_POLL_INTERVAL).unwrap()
    }

    #[test]
    fn test_every_valid_channel_completes_without_waiting() {
        let transport = ScriptedTransport::new("usb:0", 3);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 3, &poller);

        for channel in 0..3 {
            let done = dispatcher
                .dispatch(&MotionCommand::relative_move(channel, 500))
                .unwrap();
            assert_eq!(done.waits, 0);
            let done = dispatcher
                .dispatch(&MotionCommand::step_move(channel, -20, 2000, 1000))
                .unwrap();
            assert_eq!(done.channel, channel);
            assert_eq!(done.waits, 0);
        }
        assert_eq!(transport.motion_calls(), 6);
    }

    #[test]
    fn test_validation_failure_has_no_side_effects() {
        let transport = ScriptedTransport::new("usb:0", 3);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 3, &poller);

        let invalid = [
            MotionCommand::step_move(0, 10, 0, 2000),
            MotionCommand::step_move(0, 10, 4096, 2000),
            MotionCommand::step_move(0, 10, 4095, 0),
            MotionCommand::step_move(0, 10, 4095, 20_001),
            MotionCommand::step_move(3, 10, 4095, 2000),
            MotionCommand::relative_move(u32::MAX, 10),
        ];
        for command in &invalid {
            assert!(matches!(
                dispatcher.dispatch(command),
                Err(McsError::Validation(_))
            ));
        }
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_rejected_command_is_not_retried_or_polled() {
        let transport = ScriptedTransport::new("usb:0", 2).reject_commands(9);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 2, &poller);

        let err = dispatcher
            .dispatch(&MotionCommand::step_move(1, 100, 4095, 2000))
            .unwrap_err();
        assert!(matches!(
            err,
            McsError::Command {
                channel: 1,
                code: ResultCode(9)
            }
        ));
        assert_eq!(
            transport.calls(),
            vec![TransportCall::StepMove {
                channel: 1,
                steps: 100,
                amplitude: 4095,
                frequency: 2000
            }]
        );
    }

    #[test]
    fn test_relative_move_is_polled() {
        let transport = ScriptedTransport::new("usb:0", 1);
        transport.push_statuses(0, [TARGET_STATUS, TARGET_STATUS]);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 1, &poller);

        let done = dispatcher
            .dispatch(&MotionCommand::relative_move(0, -1_000))
            .unwrap();
        assert_eq!(done.status_queries, 3);
    }

    #[test]
    fn test_status_failure_surfaces_as_status_query_error() {
        let transport = ScriptedTransport::new("usb:0", 1);
        transport.push_status_error(0, 14);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 1, &poller);

        let err = dispatcher
            .dispatch(&MotionCommand::step_move(0, 1, 1, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            McsError::StatusQuery {
                channel: 0,
                code: ResultCode(14)
            }
        ));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_completion_is_logged() {
        let transport = ScriptedTransport::new("usb:0", 2);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 2, &poller);

        dispatcher
            .dispatch(&MotionCommand::step_move(1, 25, 4095, 2000))
            .unwrap();
        assert!(logs_contain("Motion completed"));
        assert!(logs_contain("step move ch1"));
    }

    #[test]
    fn test_validation_error_kind() {
        let transport = ScriptedTransport::new("usb:0", 1);
        let poller = poller();
        let dispatcher = Dispatcher::new(&transport, SystemHandle(0), 1, &poller);

        let err = dispatcher
            .dispatch(&MotionCommand::step_move(0, 1, 5000, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            McsError::Validation(ValidationError::AmplitudeOutOfRange(5000))
        ));
    }
}
