mod common;

use common::{pipeline, test_config, RecordingClassifier};
use emergency::ProtocolState;
use std::time::Duration;

fn idle_pipeline() -> common::Pipeline {
    pipeline(
        RecordingClassifier::new(Duration::from_millis(10), vec![]),
        test_config(),
    )
}

#[tokio::test(start_paused = true)]
async fn third_drowsiness_event_starts_emergency() {
    let p = idle_pipeline();

    assert!(!p.monitor.report_drowsiness().emergency_triggered);
    assert!(!p.monitor.report_drowsiness().emergency_triggered);
    let outcome = p.monitor.report_drowsiness();
    assert!(outcome.emergency_triggered);
    assert_eq!(outcome.state.count, 3);
    assert_eq!(p.monitor.protocol_snapshot().state, ProtocolState::Running);

    tokio::time::sleep(Duration::from_secs(10)).await;

    let dashboard = p.sink.snapshot();
    assert_eq!(dashboard.escalation.count, 3);
    assert_eq!(dashboard.protocol.state, ProtocolState::Completed);
    assert!(dashboard.protocol.auto_triggered);
    assert_eq!(
        dashboard.protocol.status_log.first().map(String::as_str),
        Some("Automatically triggered due to repeated drowsiness detection")
    );
    assert_eq!(dashboard.protocol.progress, 100);
}

#[tokio::test(start_paused = true)]
async fn manual_sos_can_be_cancelled() {
    let p = idle_pipeline();
    p.monitor.activate_sos().unwrap();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(p.sink.snapshot().protocol.progress, 20);

    p.monitor.cancel_sos();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let protocol = p.sink.snapshot().protocol;
    assert_eq!(protocol.state, ProtocolState::Idle);
    assert!(protocol.status_log.is_empty());
    assert_eq!(protocol.progress, 0);
}

#[tokio::test(start_paused = true)]
async fn reset_and_acknowledge_reach_sink() {
    let p = idle_pipeline();
    p.monitor.report_drowsiness();
    p.monitor.report_drowsiness();
    assert_eq!(p.sink.snapshot().escalation.count, 2);

    let acknowledged = p.monitor.acknowledge_drowsiness();
    assert_eq!(acknowledged.count, 2);

    p.monitor.reset_drowsiness();
    let escalation = p.sink.snapshot().escalation;
    assert_eq!(escalation.count, 0);
    assert!(escalation.last_event_time.is_none());
    assert_eq!(p.monitor.protocol_snapshot().state, ProtocolState::Idle);
}

#[tokio::test(start_paused = true)]
async fn status_serializes_for_dashboards() {
    let p = idle_pipeline();
    p.monitor.report_drowsiness();

    let status = p.monitor.status().await;
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["monitoring"], false);
    assert_eq!(json["escalation"]["count"], 1);
    assert_eq!(json["detection"]["alert_level"], "none");
    assert_eq!(json["protocol"]["state"], "idle");
}
