//! Event Router Integration Tests
//!
//! The push event catalog: toast kinds and durations, the domain events
//! republished, and degradation on malformed payloads.

use std::time::Duration;

use icm_console::domain::{DomainEventKind, PushMessage, StepStatus};
use icm_console::notify::{EventRouter, PushEvent, ToastKind};
use serde_json::{json, Value};

fn route(name: &str, payload: Value) -> icm_console::notify::Routed {
    EventRouter::default().route(&PushMessage::new(name, payload))
}

fn ms(n: u64) -> Option<Duration> {
    Some(Duration::from_millis(n))
}

#[test]
fn test_toast_table() {
    let cases = [
        ("GeneratingReport", ToastKind::Processing, ms(3000)),
        ("ProcessStarted", ToastKind::Info, ms(8000)),
        ("ProcessCompleted", ToastKind::Success, ms(10000)),
        ("ProcessError", ToastKind::Error, ms(0)),
        ("ProgressUpdate", ToastKind::Processing, ms(3000)),
    ];
    for (name, kind, duration) in cases {
        let routed = route(name, json!({"status": "working", "time": "2025-06-01T08:00:00"}));
        let toast = routed.toast.unwrap();
        assert_eq!(toast.kind, kind, "{name}");
        assert_eq!(toast.duration, duration, "{name}");
        assert!(routed.event.is_none(), "{name}");
    }
}

#[test]
fn test_process_finished_failure_is_error_for_ten_seconds() {
    let routed = route("ProcessFinished", json!({"success": false, "message": "Import failed"}));

    let toast = routed.toast.unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.duration, ms(10000));
    assert_eq!(toast.title, "Process Failed");

    match routed.event.unwrap().kind {
        DomainEventKind::RunFinished(outcome) => {
            assert!(!outcome.success);
            assert_eq!(outcome.message.as_deref(), Some("Import failed"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_process_finished_success() {
    let toast = route("ProcessFinished", json!({"success": true})).toast.unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.duration, ms(10000));
}

#[test]
fn test_step_update_republishes_change() {
    let routed = route(
        "ProcessStepUpdate",
        json!({"stepId": "calculating", "stepName": "Processing Calculations",
               "status": "completed", "message": "Done", "time": "2025-06-01T08:05:00"}),
    );

    let toast = routed.toast.unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.duration, ms(4000));
    assert_eq!(toast.title, "Processing Calculations");

    match routed.event.unwrap().kind {
        DomainEventKind::StepUpdate(change) => {
            assert_eq!(change.step_id, "calculating");
            assert_eq!(change.status, Some(StepStatus::Completed));
            assert_eq!(change.message.as_deref(), Some("Done"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_steps_init_carries_steps() {
    let routed = route(
        "ProcessStepsInit",
        json!({"steps": [
            {"stepId": "import_siebel_data", "stepName": "Importing Siebel Data", "status": "pending"},
            {"stepId": "calculating", "stepName": "Processing Calculations"}
        ]}),
    );

    assert!(routed.toast.is_none());
    match routed.event.unwrap().kind {
        DomainEventKind::StepsInit(Some(steps)) => assert_eq!(steps.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_malformed_payloads_never_fail() {
    let garbage = [json!(null), json!("text"), json!(42), json!([1, 2]), json!({"status": {"nested": true}})];
    for event in PushEvent::ALL {
        for payload in &garbage {
            // Routing must degrade, not panic
            let routed = route(event.name(), payload.clone());
            if let Some(toast) = routed.toast {
                assert!(!toast.title.is_empty(), "{}", event.name());
            }
        }
    }
}

#[test]
fn test_sentinel_time_renders_placeholder() {
    let routed = route("ProcessStarted", json!({"status": "go", "time": "0001-01-01T00:00:00"}));
    assert_eq!(routed.toast.unwrap().time, None);
}

#[test]
fn test_pascal_case_payload() {
    let toast = route("Notification", json!({"Type": "error", "Title": "Disk", "Message": "Full"}))
        .toast
        .unwrap();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.title, "Disk");
    assert_eq!(toast.message, "Full");
}
