//! Async facade over a blocking [`Session`].
//!
//! Every call runs on tokio's blocking pool, the same way the serial
//! adapters keep blocking port I/O off the async workers. Concurrent motion
//! across channels is one blocking task per command:
//!
//! ```rust,ignore
//! let stage = StageController::new(Session::new(SimulatedTransport::new("usb:0", 3)));
//! stage.open().await?;
//! let results = stage
//!     .move_many(vec![
//!         MotionCommand::step_move(0, 500, 4095, 2000),
//!         MotionCommand::step_move(1, 500, 4095, 2000),
//!     ])
//!     .await;
//! stage.close().await?;
//! ```
//!
//! Moves hold a shared lock on the session and `open`/`close` an exclusive
//! one, so a close waits for moves already in flight.

use crate::error::{McsError, McsResult};
use crate::motion::MotionCommand;
use crate::poller::Completion;
use crate::session::Session;
use crate::transport::McsTransport;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cloneable async handle to one session.
pub struct StageController<T: McsTransport + 'static> {
    session: Arc<RwLock<Session<T>>>,
}

impl<T: McsTransport + 'static> Clone for StageController<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<T: McsTransport + 'static> StageController<T> {
    pub fn new(session: Session<T>) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }

    async fn blocking<R, F>(&self, f: F) -> McsResult<R>
    where
        F: FnOnce(&RwLock<Session<T>>) -> McsResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || f(&session))
            .await
            .map_err(|e| McsError::Runtime(e.to_string()))?
    }

    /// Open the session and return its channel count.
    pub async fn open(&self) -> McsResult<u32> {
        self.blocking(|session| {
            let mut session = session.write();
            session.open()?;
            session.channel_count()
        })
        .await
    }

    pub async fn close(&self) -> McsResult<()> {
        self.blocking(|session| session.write().close()).await
    }

    // Reads go through the blocking pool too: a queued `close` makes new
    // readers wait for in-flight moves.
    pub async fn is_open(&self) -> McsResult<bool> {
        self.blocking(|session| Ok(session.read().is_open())).await
    }

    /// Cached channel count of the open session.
    pub async fn channel_count(&self) -> McsResult<u32> {
        self.blocking(|session| session.read().channel_count()).await
    }

    pub async fn locator(&self) -> McsResult<String> {
        self.blocking(|session| session.read().locator().map(str::to_string))
            .await
    }

    /// Dispatch one command and wait for completion.
    pub async fn dispatch(&self, command: MotionCommand) -> McsResult<Completion> {
        self.blocking(move |session| session.read().dispatch(&command))
            .await
    }

    /// Dispatch one command; cancelling `token` abandons the wait and stops the channel.
    pub async fn dispatch_with_cancel(
        &self,
        command: MotionCommand,
        token: CancellationToken,
    ) -> McsResult<Completion> {
        self.blocking(move |session| session.read().dispatch_with_cancel(&command, &token))
            .await
    }

    /// Dispatch every command concurrently, one blocking task each.
    ///
    /// Results are returned in the order of `commands`. Commands on the same
    /// channel are not serialized against each other; callers wanting
    /// sequential moves on one channel should await `dispatch` in a loop.
    pub async fn move_many(&self, commands: Vec<MotionCommand>) -> Vec<McsResult<Completion>> {
        debug!(count = commands.len(), "Dispatching concurrent moves");
        join_all(commands.into_iter().map(|command| self.dispatch(command))).await
    }
}
