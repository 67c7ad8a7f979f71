use super::*;
use std::collections::HashMap;
use wfh_core::{DomainId, EventId, ExecutionIdentity, HistoryEvent, RunId, TaskListName, WorkflowId, WorkflowType};

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf"), RunId::new())
}

fn started_state(cron_schedule: Option<String>) -> MutableState {
    let identity = identity();
    let start = HistoryEvent::WorkflowExecutionStarted {
        workflow_type: WorkflowType { name: "demo".to_string() },
        task_list: "tl".to_string(),
        input: HashMap::new(),
        execution_start_to_close_timeout_ms: 60_000,
        task_start_to_close_timeout_ms: 10_000,
        request_id: "req-1".to_string(),
        cron_schedule,
        retry_policy: None,
        attempt: 0,
        parent_workflow: None,
        continued_from_run_id: None,
        first_decision_task_backoff_seconds: 0,
    };
    let mut state = MutableState::new_from_start(identity, EventId::FIRST, 1_000, &start).expect("valid start");

    let scheduled = state
        .record_live_event(
            HistoryEvent::DecisionTaskScheduled {
                task_list: "tl".to_string(),
                start_to_close_timeout_ms: 10_000,
                attempt: 0,
            },
            1_000,
        )
        .expect("schedule decision");
    let schedule_id = scheduled[0].event_id;
    state
        .record_live_event(
            HistoryEvent::DecisionTaskStarted { scheduled_event_id: schedule_id, request_id: "poll-1".to_string() },
            1_000,
        )
        .expect("start decision");
    state
}

fn base_request(state: &MutableState, decisions: Vec<Decision>) -> DecisionTaskCompletionRequest {
    DecisionTaskCompletionRequest {
        schedule_id: state.pending_decision.as_ref().expect("pending").schedule_id,
        attempt: 0,
        decisions,
        binary_checksum: None,
        sticky_attributes: None,
        return_new_decision_task: false,
    }
}

#[test]
fn complete_workflow_closes_execution() {
    let mut state = started_state(None);
    let req = base_request(&state, vec![Decision::CompleteWorkflowExecution { result: "ok".to_string() }]);
    let config = ShardConfig::default();

    let (outcome, continue_as_new) =
        handle_decision_task_completed(&mut state, req, 2_000, &config).expect("handled");

    assert!(outcome.result.is_complete);
    assert!(continue_as_new.is_none());
    assert!(outcome
        .new_events
        .iter()
        .any(|r| matches!(r.event, HistoryEvent::WorkflowExecutionCompleted { .. })));
    assert!(outcome
        .transfer_tasks
        .iter()
        .any(|t| matches!(t.kind, wfh_storage::TransferTaskKind::CloseExecution)));
    assert!(outcome
        .timer_tasks
        .iter()
        .any(|t| matches!(t.kind, wfh_storage::TimerTaskKind::RetentionDelete)));
}

#[test]
fn complete_workflow_with_cron_schedule_continues_as_new() {
    let mut state = started_state(Some("*/5 * * * *".to_string()));
    let req = base_request(&state, vec![Decision::CompleteWorkflowExecution { result: "ok".to_string() }]);
    let config = ShardConfig::default();

    let (outcome, continue_as_new) =
        handle_decision_task_completed(&mut state, req, 2_000, &config).expect("handled");

    assert!(outcome.result.is_complete);
    let spec = continue_as_new.expect("cron backoff should continue as new");
    assert_eq!(spec.initiator, ContinueAsNewInitiator::CronSchedule);
    assert!(outcome
        .new_events
        .iter()
        .any(|r| matches!(r.event, HistoryEvent::WorkflowExecutionContinuedAsNew { .. })));
}

#[test]
fn schedule_activity_task_produces_transfer_and_timer() {
    let mut state = started_state(None);
    let req = base_request(
        &state,
        vec![Decision::ScheduleActivityTask {
            activity_id: "a1".to_string(),
            activity_type: "DoThing".to_string(),
            task_list: TaskListName::new("tl"),
            input: "payload".to_string(),
            schedule_to_close_timeout_ms: 5_000,
            schedule_to_start_timeout_ms: 1_000,
            start_to_close_timeout_ms: 3_000,
            heartbeat_timeout_ms: 0,
            retry_policy: None,
        }],
    );
    let config = ShardConfig::default();

    let (outcome, continue_as_new) =
        handle_decision_task_completed(&mut state, req, 2_000, &config).expect("handled");

    assert!(continue_as_new.is_none());
    assert!(!outcome.result.is_complete);
    assert_eq!(state.pending_activities.len(), 1);
    assert!(outcome
        .transfer_tasks
        .iter()
        .any(|t| matches!(t.kind, wfh_storage::TransferTaskKind::ActivityTask { .. })));
    assert!(outcome
        .timer_tasks
        .iter()
        .any(|t| matches!(t.kind, wfh_storage::TimerTaskKind::ActivityTimeout { .. })));
}

#[test]
fn unhandled_buffered_event_fails_decision_and_reschedules() {
    let mut state = started_state(None);
    // A signal arrives while the decision task is outstanding; it gets
    // buffered rather than committed immediately.
    state
        .record_live_event(
            HistoryEvent::WorkflowExecutionSignaled {
                signal_name: "ping".to_string(),
                input: String::new(),
                request_id: "sig-1".to_string(),
            },
            1_500,
        )
        .expect("buffered, no error");
    assert_eq!(state.buffered_events.len(), 1);

    let req = base_request(&state, vec![Decision::CompleteWorkflowExecution { result: "ok".to_string() }]);
    let config = ShardConfig::default();

    let (outcome, continue_as_new) =
        handle_decision_task_completed(&mut state, req, 2_000, &config).expect("handled");

    assert!(continue_as_new.is_none());
    assert!(!outcome.result.is_complete, "workflow should not close on an unhandled decision");
    assert!(outcome
        .new_events
        .iter()
        .any(|r| matches!(r.event, HistoryEvent::DecisionTaskFailed { .. })));
    assert!(outcome.result.new_decision_schedule_id.is_some());
    assert!(!state.is_closed());
    assert!(state.pending_decision.is_some());
}

#[test]
fn second_completion_decision_is_counted_not_applied() {
    let mut state = started_state(None);
    let req = base_request(
        &state,
        vec![
            Decision::CompleteWorkflowExecution { result: "first".to_string() },
            Decision::CancelWorkflowExecution { details: "should be ignored".to_string() },
        ],
    );
    let config = ShardConfig::default();

    let (outcome, continue_as_new) =
        handle_decision_task_completed(&mut state, req, 2_000, &config).expect("handled");

    assert!(outcome.result.is_complete);
    assert!(continue_as_new.is_none());
    assert_eq!(outcome.result.multiple_completion_decisions, 1, "the trailing completion decision is counted");
    assert_eq!(
        outcome.new_events.iter().filter(|r| matches!(r.event, HistoryEvent::WorkflowExecutionCompleted { .. })).count(),
        1
    );
    assert!(
        !outcome.new_events.iter().any(|r| matches!(r.event, HistoryEvent::WorkflowExecutionCanceled { .. })),
        "the trailing completion decision must not also append its own close event"
    );
}

#[test]
fn inline_decision_task_is_returned_when_requested() {
    let mut state = started_state(None);
    let mut req = base_request(&state, vec![]);
    req.return_new_decision_task = true;
    let config = ShardConfig::default();

    let (outcome, _) = handle_decision_task_completed(&mut state, req, 2_000, &config).expect("handled");

    let inline = outcome.result.inline_poll.expect("inline decision task");
    assert_eq!(Some(inline.schedule_id), outcome.result.new_decision_schedule_id);
    assert!(outcome.transfer_tasks.is_empty(), "inline poll should not dispatch via transfer queue");
}
