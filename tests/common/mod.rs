//! Common test utilities for mcs_stage integration tests
//!
//! - Sessions over a scripted transport, already opened
//! - Fast pollers so tests do not sit in 50ms sleeps
//! - Timing assertions for the simulated controller

#![allow(dead_code)] // Not every test binary uses every helper

use mcs_stage::{
    poller::{CompletionPoller, MIN_POLL_INTERVAL},
    transport::ScriptedTransport,
    Session,
};
use std::sync::Arc;
use std::time::Duration;

/// Poll interval used by the integration tests.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn fast_poller() -> CompletionPoller {
    CompletionPoller::new(TEST_POLL_INTERVAL.max(MIN_POLL_INTERVAL)).unwrap()
}

/// Open session over a shared scripted transport.
///
/// The transport is returned separately so tests can script statuses and
/// inspect recorded calls while the session owns its own `Arc`.
pub fn open_scripted(
    locator: &str,
    channels: u32,
) -> (Session<Arc<ScriptedTransport>>, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(locator, channels));
    let mut session = Session::new(Arc::clone(&transport)).with_poller(fast_poller());
    session.open().unwrap();
    (session, transport)
}

/// Slack added on top of a simulated move: one poll interval plus scheduling noise.
pub fn completion_slack() -> Duration {
    let noise = if is_ci() {
        Duration::from_millis(250)
    } else {
        Duration::from_millis(60)
    };
    TEST_POLL_INTERVAL + noise
}

/// Assert a simulated move took at least `expected` and not much longer.
pub fn assert_completed_near(actual: Duration, expected: Duration, context: &str) {
    let max = expected + completion_slack();
    assert!(
        actual >= expected && actual <= max,
        "{}: expected {:?} to {:?}, got {:?}",
        context,
        expected,
        max,
        actual
    );
}

/// Check if running in CI environment
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
}
