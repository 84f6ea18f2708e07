//! End-to-end motion against the simulated controller.

mod common;

use common::{assert_completed_near, completion_slack, fast_poller};
use mcs_stage::{
    config::McsConfig, poller::CompletionPoller, transport::SimulatedTransport, McsError,
    MotionCommand, Session, StageController,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn simulated_session(channels: u32) -> (Session<Arc<SimulatedTransport>>, Arc<SimulatedTransport>) {
    // 1 mm/s closed-loop speed keeps relative moves in the tens of milliseconds
    let sim = Arc::new(SimulatedTransport::with_speed("usb:id:sim", channels, 1_000_000.0));
    let session = Session::new(Arc::clone(&sim)).with_poller(fast_poller());
    (session, sim)
}

#[test]
fn test_step_move_blocks_for_travel_time() {
    let (mut session, sim) = simulated_session(3);
    session.open().unwrap();

    // 200 steps at 2 kHz = 100ms
    let done = session.step_move(1, 200, 4095, 2000).unwrap();
    assert_completed_near(done.elapsed, Duration::from_millis(100), "200 steps @ 2kHz");
    assert!(done.waits > 0);
    assert_eq!(sim.step_count(1), Some(200));

    session.close().unwrap();
}

#[test]
fn test_relative_moves_accumulate() {
    let (mut session, sim) = simulated_session(2);
    session.open().unwrap();

    session.move_relative(0, 30_000).unwrap();
    session.move_relative(0, -10_000).unwrap();
    assert_eq!(sim.position_nm(0), Some(20_000));
    assert_eq!(sim.position_nm(1), Some(0));
}

#[test]
fn test_parallel_channels_from_threads() {
    let (mut session, sim) = simulated_session(3);
    session.open().unwrap();

    // 160 steps at 1 kHz = 160ms per channel, 480ms if run one after another
    let per_move = Duration::from_millis(160);
    let started = Instant::now();
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..3)
            .map(|ch| {
                let session = &session;
                s.spawn(move || session.step_move(ch, 160, 4095, 1000))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let elapsed = started.elapsed();

    assert!(results.iter().all(Result::is_ok));
    let limit = per_move + completion_slack();
    assert!(limit < per_move * 3);
    assert!(elapsed < limit, "took {:?}, limit {:?}", elapsed, limit);
    for ch in 0..3 {
        assert_eq!(sim.step_count(ch), Some(160));
    }
}

#[test]
fn test_timeout_stops_simulated_channel() {
    let sim = Arc::new(SimulatedTransport::new("usb:id:sim", 1));
    let poller = CompletionPoller::new(Duration::from_millis(10))
        .unwrap()
        .with_timeout(Duration::from_millis(50));
    let mut session = Session::new(Arc::clone(&sim)).with_poller(poller);
    session.open().unwrap();

    // 2000 steps at 1 kHz would take 2s
    let err = session.step_move(0, 2000, 4095, 1000).unwrap_err();
    assert!(matches!(err, McsError::Timeout { channel: 0, .. }));

    // The channel was stopped, so the next move starts from rest
    let done = session.step_move(0, 1, 4095, 1000).unwrap();
    assert!(done.elapsed < Duration::from_millis(1) + completion_slack());
}

#[test]
fn test_session_from_config_uses_locator_and_poller() {
    let mut config = McsConfig::default();
    config.session.locator = Some("usb:id:sim".to_string());
    config.polling.interval_ms = 15;

    let sim = SimulatedTransport::new("usb:id:sim", 2);
    let mut session = Session::from_config(sim, &config).unwrap();
    assert_eq!(session.poller().interval(), Duration::from_millis(15));

    session.open().unwrap();
    assert_eq!(session.locator().unwrap(), "usb:id:sim");
    assert_eq!(session.channel_count().unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stage_controller_concurrent_moves() {
    let sim = Arc::new(SimulatedTransport::new("usb:id:sim", 3));
    let stage = StageController::new(Session::new(Arc::clone(&sim)).with_poller(fast_poller()));
    assert_eq!(stage.open().await.unwrap(), 3);

    // 200 steps at 1 kHz = 200ms per channel
    let per_move = Duration::from_millis(200);
    let commands: Vec<_> = (0..3)
        .map(|ch| MotionCommand::step_move(ch, -200, 4095, 1000))
        .collect();
    let started = Instant::now();
    let results = stage.move_many(commands).await;
    let elapsed = started.elapsed();

    assert!(results.iter().all(Result::is_ok));
    let limit = per_move + completion_slack();
    assert!(limit < per_move * 3);
    assert!(elapsed < limit, "took {:?}, limit {:?}", elapsed, limit);
    for ch in 0..3 {
        assert_eq!(sim.step_count(ch), Some(-200));
    }
    stage.close().await.unwrap();
}

#[tokio::test]
async fn test_stage_controller_cancellation() {
    let sim = Arc::new(SimulatedTransport::new("usb:id:sim", 1));
    let stage = StageController::new(Session::new(Arc::clone(&sim)).with_poller(fast_poller()));
    stage.open().await.unwrap();

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });

    let result = stage
        .dispatch_with_cancel(MotionCommand::step_move(0, 5000, 4095, 1000), token)
        .await;
    assert!(matches!(result, Err(McsError::Cancelled { channel: 0 })));
    stage.close().await.unwrap();
}
