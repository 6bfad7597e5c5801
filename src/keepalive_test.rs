use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use super::*;
use crate::test_helpers::{failing_sink, recording_sink};

#[tokio::test]
async fn pings_on_each_period() {
    let (sink, mut rx) = recording_sink();
    let outbound = Outbound::new(sink, Duration::from_millis(100));
    let shutdown = Shutdown::new();
    let handle = spawn_keepalive(outbound, Duration::from_millis(30), shutdown.clone());

    for _ in 0..3 {
        let frame = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("ping should arrive")
            .expect("sink open");
        assert!(matches!(frame, Message::Ping(ref data) if data.is_empty()));
    }

    shutdown.trigger(CloseReason::Closed);
    timeout(Duration::from_secs(1), handle)
        .await
        .expect("pump should stop on shutdown")
        .expect("pump task");
}

#[tokio::test]
async fn first_ping_waits_one_period() {
    let (sink, mut rx) = recording_sink();
    let outbound = Outbound::new(sink, Duration::from_millis(100));
    let shutdown = Shutdown::new();
    let _handle = spawn_keepalive(outbound, Duration::from_millis(200), shutdown.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
    shutdown.trigger(CloseReason::Closed);
}

#[tokio::test]
async fn failed_ping_stops_pump_and_triggers_shutdown() {
    let outbound = Outbound::new(failing_sink(), Duration::from_millis(100));
    let shutdown = Shutdown::new();
    let handle = spawn_keepalive(outbound, Duration::from_millis(20), shutdown.clone());

    timeout(Duration::from_secs(1), handle)
        .await
        .expect("pump should exit after failed ping")
        .expect("pump task");
    assert_eq!(shutdown.reason(), Some(CloseReason::KeepaliveFailed));
}

#[tokio::test]
async fn failed_ping_after_shutdown_keeps_earlier_reason() {
    let outbound = Outbound::new(failing_sink(), Duration::from_millis(100));
    let shutdown = Shutdown::new();
    shutdown.trigger(CloseReason::PeerClosed);
    let handle = spawn_keepalive(outbound, Duration::from_millis(20), shutdown.clone());

    timeout(Duration::from_secs(1), handle)
        .await
        .expect("pump should exit")
        .expect("pump task");
    assert_eq!(shutdown.reason(), Some(CloseReason::PeerClosed));
}
