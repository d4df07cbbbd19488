//! Connection state machine tests on a paused clock.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;

use rdeck::connection::mock::{Behavior, MockConnector};
use rdeck::connection::{
    ConnectionManager, ConnectionOptions, ConnectionSnapshot, ConnectionState, OutboundCommand,
    Target, Telemetry,
};

use crate::common::init_test_logging;

const RETRY: Duration = Duration::from_secs(3);
const HANDSHAKE: Duration = Duration::from_secs(10);

fn options() -> ConnectionOptions {
    ConnectionOptions {
        retry_delay: RETRY,
        handshake_timeout: HANDSHAKE,
        ws_path: "/ws".to_string(),
    }
}

fn device_a() -> Target {
    Target::new("10.0.0.1", 8002)
}

fn device_b() -> Target {
    Target::new("10.0.0.2", 8002)
}

fn manager(connector: &MockConnector) -> ConnectionManager<MockConnector> {
    ConnectionManager::new(connector.clone(), Handle::current(), options())
}

fn waiting_for_retry(snap: &ConnectionSnapshot) -> bool {
    snap.state == ConnectionState::Disconnected && snap.retry_pending
}

#[tokio::test(start_paused = true)]
async fn connect_reaches_connected() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    assert_eq!(manager.snapshot().state, ConnectionState::Disconnected);
    manager.connect(device_a());
    assert_eq!(manager.snapshot().state, ConnectionState::Connecting);

    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let snap = manager.snapshot();
    assert_eq!(snap.target, Some(device_a()));
    assert!(!snap.retry_pending);
    assert_eq!(connector.attempts(), vec![device_a()]);
}

#[tokio::test(start_paused = true)]
async fn forced_close_schedules_one_retry_and_reconnect_cancels_it() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut accepted = connector.accepted();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let mut remote = accepted.recv().await.unwrap();

    remote.close();
    rx.wait_for(waiting_for_retry).await.unwrap();
    assert_eq!(connector.attempt_count(), 1);

    manager.reconnect();
    assert_eq!(manager.snapshot().state, ConnectionState::Connecting);
    assert!(!manager.snapshot().retry_pending);
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    assert_eq!(connector.attempt_count(), 2);

    // The cancelled retry never fires.
    tokio::time::sleep(RETRY * 4).await;
    assert_eq!(connector.attempt_count(), 2);
    assert!(manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn failed_attempts_retry_after_fixed_delay() {
    init_test_logging();
    let connector = MockConnector::new();
    connector.script(&[Behavior::Refuse, Behavior::Refuse]);
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    let started = Instant::now();
    manager.connect(device_a());
    rx.wait_for(waiting_for_retry).await.unwrap();
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();

    assert_eq!(connector.attempt_count(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= RETRY * 2, "retried too early: {elapsed:?}");
    assert!(elapsed < RETRY * 3, "delay grew between attempts: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn hung_handshake_times_out_then_retries() {
    init_test_logging();
    let connector = MockConnector::new();
    connector.script(&[Behavior::Hang]);
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    let started = Instant::now();
    manager.connect(device_a());
    rx.wait_for(waiting_for_retry).await.unwrap();
    assert!(started.elapsed() >= HANDSHAKE);

    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    assert!(started.elapsed() >= HANDSHAKE + RETRY);
    assert_eq!(connector.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn retries_are_unbounded() {
    init_test_logging();
    let connector = MockConnector::with_fallback(Behavior::Refuse);
    let mut manager = manager(&connector);

    manager.connect(device_a());
    tokio::time::sleep(RETRY * 10 + Duration::from_millis(10)).await;

    assert_eq!(connector.attempt_count(), 11);
    assert!(waiting_for_retry(&manager.snapshot()));
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_retry() {
    init_test_logging();
    let connector = MockConnector::with_fallback(Behavior::Refuse);
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(waiting_for_retry).await.unwrap();
    manager.disconnect();

    let snap = manager.snapshot();
    assert_eq!(snap.state, ConnectionState::Disconnected);
    assert!(!snap.retry_pending);
    assert_eq!(snap.target, None);

    tokio::time::sleep(RETRY * 5).await;
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_to_same_target_is_a_no_op() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let generation = manager.snapshot().generation;

    manager.connect(device_a());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(manager.snapshot().generation, generation);
    assert!(manager.is_connected());
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn switching_target_never_reports_old_telemetry() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut accepted = connector.accepted();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let remote_a = accepted.recv().await.unwrap();
    remote_a.push_status(90.0, 90.0, 90.0);
    rx.wait_for(|s| s.telemetry.is_some()).await.unwrap();

    manager.connect(device_b());
    let snap = manager.snapshot();
    assert_eq!(snap.state, ConnectionState::Connecting);
    assert_eq!(snap.target, Some(device_b()));
    assert_eq!(snap.telemetry, None);

    // Late frames from the torn-down link must not land on B.
    remote_a.push_status(91.0, 91.0, 91.0);
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let remote_b = accepted.recv().await.unwrap();
    assert_eq!(remote_b.target, device_b());
    remote_a.push_status(92.0, 92.0, 92.0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.telemetry(), None);

    remote_b.push_status(10.0, 20.0, 30.0);
    let snap = rx.wait_for(|s| s.telemetry.is_some()).await.unwrap().clone();
    assert_eq!(
        snap.telemetry,
        Some(Telemetry {
            cpu: 10.0,
            memory: 20.0,
            disk: 30.0
        })
    );
    assert_eq!(snap.target, Some(device_b()));
    assert_eq!(connector.attempts(), vec![device_a(), device_b()]);
}

#[tokio::test(start_paused = true)]
async fn telemetry_ignores_unknown_frames() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut accepted = connector.accepted();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let remote = accepted.recv().await.unwrap();

    remote.push("not json");
    remote.push(r#"{"type":"ack","data":{}}"#);
    remote.push_status(1.0, 2.0, 3.0);
    rx.wait_for(|s| s.telemetry.is_some()).await.unwrap();

    assert!(manager.is_connected());
    assert_eq!(manager.telemetry().map(|t| t.disk), Some(3.0));
}

#[tokio::test(start_paused = true)]
async fn send_requires_a_live_link() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut accepted = connector.accepted();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    assert!(!manager.send(OutboundCommand::new("press", vec!["enter".into()])));

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let mut remote = accepted.recv().await.unwrap();

    let command = OutboundCommand::new("hotkey", vec!["ctrl".into(), "c".into()]);
    assert!(manager.send(command.clone()));
    assert_eq!(remote.next_command().await, Some(command));

    remote.close();
    rx.wait_for(waiting_for_retry).await.unwrap();
    assert!(!manager.send(OutboundCommand::new("press", vec!["a".into()])));
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_queued_commands_and_closes() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut accepted = connector.accepted();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let mut remote = accepted.recv().await.unwrap();

    assert!(manager.send(OutboundCommand::new("type", vec!["one".into()])));
    assert!(manager.send(OutboundCommand::new("type", vec!["two".into()])));
    manager.shutdown(Duration::from_secs(1)).await;

    assert_eq!(remote.next_command().await.map(|c| c.params), Some(vec!["one".to_string()]));
    assert_eq!(remote.next_command().await.map(|c| c.params), Some(vec!["two".to_string()]));
    assert_eq!(remote.next_command().await, None);

    let snap = manager.snapshot();
    assert_eq!(snap.state, ConnectionState::Disconnected);
    assert!(!snap.retry_pending);
    tokio::time::sleep(RETRY * 3).await;
    assert_eq!(connector.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_manager_closes_the_link() {
    init_test_logging();
    let connector = MockConnector::new();
    let mut accepted = connector.accepted();
    let mut manager = manager(&connector);
    let mut rx = manager.subscribe();

    manager.connect(device_a());
    rx.wait_for(ConnectionSnapshot::is_connected).await.unwrap();
    let mut remote = accepted.recv().await.unwrap();

    drop(manager);
    assert_eq!(remote.next_command().await, None);
    tokio::time::sleep(RETRY * 3).await;
    assert_eq!(connector.attempt_count(), 1);
}
