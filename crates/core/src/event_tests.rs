// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

fn started() -> HistoryEvent {
    HistoryEvent::WorkflowExecutionStarted {
        workflow_type: WorkflowType { name: "OrderFlow".into() },
        task_list: "orders".into(),
        input: HashMap::new(),
        execution_start_to_close_timeout_ms: 60_000,
        task_start_to_close_timeout_ms: 10_000,
        request_id: "req-1".into(),
        cron_schedule: None,
        retry_policy: None,
        attempt: 0,
        parent_workflow: None,
        continued_from_run_id: None,
        first_decision_task_backoff_seconds: 0,
    }
}

#[test]
fn name_matches_serde_tag() {
    let event = started();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], event.name());
}

#[test]
fn close_events_are_flagged() {
    assert!(HistoryEvent::WorkflowExecutionTimedOut.is_close_event());
    assert!(!started().is_close_event());
}

#[test]
fn close_status_maps_to_enum() {
    let event = HistoryEvent::WorkflowExecutionFailed {
        reason: "boom".into(),
        details: "".into(),
        decision_task_completed_event_id: EventId(4),
    };
    assert_eq!(event.close_status(), Some(CloseStatus::Failed));
    assert_eq!(started().close_status(), None);
}

#[test]
fn unknown_type_tag_deserializes_to_custom() {
    let json = serde_json::json!({"type": "future:event_nobody_has_heard_of", "x": 1});
    let event: HistoryEvent = serde_json::from_value(json).unwrap();
    assert_eq!(event, HistoryEvent::Custom);
}

#[test]
fn round_trips_through_json() {
    let event = HistoryEvent::TimerStarted {
        timer_id: UserTimerId::new("t1"),
        start_to_fire_timeout_ms: 5_000,
        decision_task_completed_event_id: EventId(3),
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: HistoryEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(event, back);
}

#[test]
fn record_flattens_envelope_and_attributes() {
    let record = HistoryEventRecord::new(EventId(1), 1_700_000_000_000, started());
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["event_id"], 1);
    assert_eq!(json["type"], "workflow:started");
    let back: HistoryEventRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn log_summary_includes_identifying_fields() {
    let event = HistoryEvent::ActivityTaskScheduled {
        activity_id: "a1".into(),
        activity_type: "ChargeCard".into(),
        task_list: "payments".into(),
        input: "{}".into(),
        schedule_to_close_timeout_ms: 1000,
        schedule_to_start_timeout_ms: 1000,
        start_to_close_timeout_ms: 1000,
        heartbeat_timeout_ms: 0,
        retry_policy: None,
        decision_task_completed_event_id: EventId(2),
    };
    let summary = event.log_summary();
    assert!(summary.contains("a1"));
    assert!(summary.contains("ChargeCard"));
}
