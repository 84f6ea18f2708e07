//! Synchronous motion-command sessions for SmarAct MCS positioning stages.
//!
//! The crate opens a session on an MCS controller, issues relative and step
//! moves on individual channels and blocks until the controller reports that
//! the channel stopped seeking its target.
//!
//! - [`session::Session`] - open/close lifecycle and cached channel count
//! - [`dispatch::Dispatcher`] - validation and command forwarding
//! - [`poller::CompletionPoller`] - fixed-interval wait for motion completion
//! - [`transport`] - driver boundary (simulated, scripted, native)
//! - [`stage::StageController`] - async facade for tokio callers

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod motion;
pub mod poller;
pub mod session;
pub mod stage;
pub mod transport;
pub mod validate;

pub use error::{McsError, McsResult};
pub use motion::{MotionCommand, MotionStatus};
pub use poller::{Completion, CompletionPoller, PollState};
pub use session::Session;
pub use stage::StageController;
pub use transport::{McsTransport, ResultCode, SystemHandle};
