//! MCS session lifecycle.
//!
//! A [`Session`] owns one connection to a controller: the handle assigned at
//! open time and the channel count read right after. The count is cached for
//! the lifetime of the handle and read again on every open, since the
//! attached positioners may change between sessions.
//!
//! `open` and `close` take `&mut self` while dispatching takes `&self`, so
//! the borrow checker keeps a session from closing under an in-flight move.
//! Several threads can still dispatch on different channels concurrently:
//!
//! ```rust,ignore
//! let mut session = Session::new(SimulatedTransport::new("usb:0", 3));
//! session.open()?;
//! std::thread::scope(|s| {
//!     s.spawn(|| session.step_move(0, 500, 4095, 2000));
//!     s.spawn(|| session.step_move(1, -500, 4095, 2000));
//! });
//! session.close()?;
//! ```

use crate::config::McsConfig;
use crate::dispatch::Dispatcher;
use crate::error::{LifecycleError, McsError, McsResult};
use crate::motion::MotionCommand;
use crate::poller::{Completion, CompletionPoller};
use crate::transport::{McsTransport, SystemHandle, SYNC_MODE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct OpenSystem {
    handle: SystemHandle,
    locator: String,
    channel_count: u32,
}

/// One hardware session.
pub struct Session<T: McsTransport> {
    transport: T,
    locator: Option<String>,
    poller: CompletionPoller,
    open: Option<OpenSystem>,
}

impl<T: McsTransport> Session<T> {
    /// Closed session with the default poller that discovers its locator.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            locator: None,
            poller: CompletionPoller::default(),
            open: None,
        }
    }

    /// Closed session configured from `config`.
    pub fn from_config(transport: T, config: &McsConfig) -> McsResult<Self> {
        let mut session = Self::new(transport).with_poller(config.poller()?);
        session.locator = config.session.locator.clone();
        Ok(session)
    }

    /// Open `locator` directly instead of running discovery.
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Replace the default completion poller.
    pub fn with_poller(mut self, poller: CompletionPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn poller(&self) -> &CompletionPoller {
        &self.poller
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open the controller.
    ///
    /// Uses the configured locator, or the first entry returned by discovery.
    /// On success the channel count is read and cached.
    ///
    /// # Errors
    /// - `Lifecycle(AlreadyOpen)` if this session already holds a handle
    /// - `Discovery` / `NoSystemFound` when discovery fails or finds nothing
    /// - `Open` when the controller refuses the connection
    /// - `ChannelCount` when the count cannot be read; the handle is released
    pub fn open(&mut self) -> McsResult<()> {
        if let Some(open) = &self.open {
            return Err(LifecycleError::AlreadyOpen {
                handle: open.handle,
            }
            .into());
        }

        let locator = match &self.locator {
            Some(locator) => locator.clone(),
            None => self.discover()?,
        };

        let handle = self
            .transport
            .open_system(&locator, SYNC_MODE)
            .map_err(|code| McsError::Open {
                locator: locator.clone(),
                code,
            })?;

        let channel_count = match self.transport.channel_count(handle) {
            Ok(count) => count,
            Err(code) => {
                if let Err(close_code) = self.transport.close_system(handle) {
                    warn!(%handle, code = %close_code, "Failed to release handle after channel count error");
                }
                return Err(McsError::ChannelCount { code });
            }
        };

        info!(%locator, %handle, channel_count, "MCS system opened");
        self.open = Some(OpenSystem {
            handle,
            locator,
            channel_count,
        });
        Ok(())
    }

    fn discover(&self) -> McsResult<String> {
        let list = self
            .transport
            .find_systems()
            .map_err(|code| McsError::Discovery { code })?;
        debug!(locators = %list.trim(), "Discovery finished");

        list.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or(McsError::NoSystemFound)
    }

    /// Release the handle.
    ///
    /// The session counts as closed even when the driver reports an error;
    /// that error is returned as `Close` and the stale handle is never reused.
    pub fn close(&mut self) -> McsResult<()> {
        let open = self.open.take().ok_or(LifecycleError::NotOpen)?;
        self.transport
            .close_system(open.handle)
            .map_err(|code| McsError::Close { code })?;
        info!(locator = %open.locator, handle = %open.handle, "MCS system closed");
        Ok(())
    }

    fn open_system(&self) -> McsResult<&OpenSystem> {
        self.open.as_ref().ok_or_else(|| LifecycleError::NotOpen.into())
    }

    pub fn handle(&self) -> McsResult<SystemHandle> {
        Ok(self.open_system()?.handle)
    }

    /// Locator of the open system.
    pub fn locator(&self) -> McsResult<&str> {
        Ok(&self.open_system()?.locator)
    }

    /// Channel count cached at open time.
    pub fn channel_count(&self) -> McsResult<u32> {
        Ok(self.open_system()?.channel_count)
    }

    /// Dispatcher for the open system.
    pub fn dispatcher(&self) -> McsResult<Dispatcher<'_, T>> {
        let open = self.open_system()?;
        Ok(Dispatcher::new(
            &self.transport,
            open.handle,
            open.channel_count,
            &self.poller,
        ))
    }

    /// Issue `command` and block until the channel stops moving.
    pub fn dispatch(&self, command: &MotionCommand) -> McsResult<Completion> {
        self.dispatcher()?.dispatch(command)
    }

    pub fn dispatch_with_cancel(
        &self,
        command: &MotionCommand,
        cancel: &CancellationToken,
    ) -> McsResult<Completion> {
        self.dispatcher()?.dispatch_with_cancel(command, cancel)
    }

    pub fn step_move(
        &self,
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    ) -> McsResult<Completion> {
        self.dispatch(&MotionCommand::step_move(channel, steps, amplitude, frequency))
    }

    pub fn move_relative(&self, channel: u32, delta_nm: i32) -> McsResult<Completion> {
        self.dispatch(&MotionCommand::relative_move(channel, delta_nm))
    }
}

impl<T: McsTransport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(open) = self.open.take() {
            if let Err(code) = self.transport.close_system(open.handle) {
                warn!(handle = %open.handle, %code, "Failed to close MCS system on drop");
            }
        }
    }
}
