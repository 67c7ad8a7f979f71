// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::WorkflowType;
use crate::identity::{DomainId, RunId, WorkflowId};
use std::collections::HashMap;

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new(DomainId::new("orders"), WorkflowId::new("wf-1"), RunId::new())
}

fn start_event() -> HistoryEvent {
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

fn started_state() -> MutableState {
    MutableState::new_from_start(identity(), EventId::FIRST, 1_000, &start_event()).unwrap()
}

#[test]
fn new_from_start_rejects_wrong_event_type() {
    let not_a_start = HistoryEvent::WorkflowExecutionTimedOut;
    let result = MutableState::new_from_start(identity(), EventId::FIRST, 1_000, &not_a_start);
    assert!(result.is_err());
}

#[test]
fn new_from_start_sets_next_event_id_to_two() {
    let state = started_state();
    assert_eq!(state.next_event_id, EventId(2));
    assert_eq!(state.condition(), EventId(2));
}

#[test]
fn decision_schedule_and_complete_round_trip() {
    let mut state = started_state();
    let committed = state
        .record_live_event(
            HistoryEvent::DecisionTaskScheduled {
                task_list: "orders".into(),
                start_to_close_timeout_ms: 10_000,
                attempt: 0,
            },
            1_001,
        )
        .unwrap();
    assert_eq!(committed.len(), 1);
    assert!(state.pending_decision.is_some());

    state
        .record_live_event(
            HistoryEvent::DecisionTaskStarted { scheduled_event_id: EventId(2), request_id: "r".into() },
            1_002,
        )
        .unwrap();

    let committed = state
        .record_live_event(
            HistoryEvent::DecisionTaskCompleted {
                scheduled_event_id: EventId(2),
                started_event_id: EventId(3),
                binary_checksum: None,
            },
            1_003,
        )
        .unwrap();
    assert_eq!(committed.len(), 1);
    assert!(state.pending_decision.is_none());
    assert_eq!(state.next_event_id, EventId(5));
}

#[test]
fn events_buffer_while_decision_task_outstanding_and_drain_on_completion() {
    let mut state = started_state();
    state
        .record_live_event(
            HistoryEvent::DecisionTaskScheduled {
                task_list: "orders".into(),
                start_to_close_timeout_ms: 10_000,
                attempt: 0,
            },
            1_001,
        )
        .unwrap();
    state
        .record_live_event(
            HistoryEvent::DecisionTaskStarted { scheduled_event_id: EventId(2), request_id: "r".into() },
            1_002,
        )
        .unwrap();

    // A signal arrives mid-decision: it must not be applied yet.
    let committed = state
        .record_live_event(
            HistoryEvent::WorkflowExecutionSignaled {
                signal_name: "cancel_order".into(),
                input: "{}".into(),
                request_id: "sig-1".into(),
            },
            1_003,
        )
        .unwrap();
    assert!(committed.is_empty());
    assert!(state.signals_requested.is_empty());
    assert_eq!(state.buffered_events.len(), 1);

    let committed = state
        .record_live_event(
            HistoryEvent::DecisionTaskCompleted {
                scheduled_event_id: EventId(2),
                started_event_id: EventId(3),
                binary_checksum: None,
            },
            1_004,
        )
        .unwrap();
    // DecisionTaskCompleted itself, plus the drained signal.
    assert_eq!(committed.len(), 2);
    assert!(state.buffered_events.is_empty());
    assert!(state.signals_requested.contains("sig-1"));
}

#[test]
fn cannot_append_after_close() {
    let mut state = started_state();
    state
        .record_live_event(
            HistoryEvent::WorkflowExecutionCompleted {
                result: "done".into(),
                decision_task_completed_event_id: EventId(1),
            },
            1_005,
        )
        .unwrap();
    assert!(state.is_closed());
    let result = state.record_live_event(HistoryEvent::WorkflowExecutionTimedOut, 1_006);
    assert!(result.is_err());
}

#[test]
fn activity_lifecycle_tracks_pending_collection() {
    let mut state = started_state();
    let committed = state
        .record_live_event(
            HistoryEvent::ActivityTaskScheduled {
                activity_id: "a1".into(),
                activity_type: "ChargeCard".into(),
                task_list: "payments".into(),
                input: "{}".into(),
                schedule_to_close_timeout_ms: 1000,
                schedule_to_start_timeout_ms: 1000,
                start_to_close_timeout_ms: 1000,
                heartbeat_timeout_ms: 0,
                retry_policy: None,
                decision_task_completed_event_id: EventId(1),
            },
            1_001,
        )
        .unwrap();
    let schedule_id = committed[0].event_id;
    assert!(state.pending_activities.contains_key(&schedule_id));

    state
        .record_live_event(
            HistoryEvent::ActivityTaskCompleted {
                scheduled_event_id: schedule_id,
                started_event_id: schedule_id.next(),
                result: "ok".into(),
            },
            1_002,
        )
        .unwrap();
    assert!(!state.pending_activities.contains_key(&schedule_id));
}

#[test]
fn rebuild_from_history_is_idempotent() {
    let mut state = started_state();
    state
        .record_live_event(
            HistoryEvent::WorkflowExecutionSignaled {
                signal_name: "ping".into(),
                input: "{}".into(),
                request_id: "r1".into(),
            },
            1_001,
        )
        .unwrap();

    let records = vec![
        HistoryEventRecord::new(EventId(1), 1_000, start_event()),
        HistoryEventRecord::new(
            EventId(2),
            1_001,
            HistoryEvent::WorkflowExecutionSignaled {
                signal_name: "ping".into(),
                input: "{}".into(),
                request_id: "r1".into(),
            },
        ),
    ];
    let rebuilt = MutableState::rebuild_from_history(identity(), &records).unwrap();
    let rebuilt_again = MutableState::rebuild_from_history(identity(), &records).unwrap();
    assert_eq!(rebuilt, rebuilt_again);
    assert_eq!(rebuilt.next_event_id, state.next_event_id);
}

#[test]
fn has_expired_respects_execution_timeout() {
    let state = started_state();
    assert!(!state.has_expired(1_500));
    assert!(state.has_expired(61_000));
}
