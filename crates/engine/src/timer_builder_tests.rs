use super::*;
use wfh_core::{DomainId, RunId, ScheduleId, TaskListName, WorkflowId};

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf"), RunId::new())
}

#[test]
fn decision_timeout_fires_at_scheduled_plus_timeout() {
    let decision = DecisionInfo {
        schedule_id: ScheduleId::FIRST,
        started_id: None,
        request_id: None,
        attempt: 0,
        start_to_close_timeout_ms: 10_000,
        task_list: TaskListName::new("tl"),
    };
    let spec = decision_timeout(&decision, 1_000);
    assert_eq!(spec.fire_timestamp_ms, 11_000);
    assert_eq!(spec.kind, TimerTaskKind::DecisionTimeout { schedule_id: ScheduleId::FIRST, attempt: 0 });
}

#[test]
fn close_cleanup_produces_close_execution_and_retention_delete() {
    let (transfer_kind, timer_spec) = close_cleanup_tasks(1_000, 86_400_000);
    assert_eq!(transfer_kind, TransferTaskKind::CloseExecution);
    assert_eq!(timer_spec.kind, TimerTaskKind::RetentionDelete);
    assert_eq!(timer_spec.fire_timestamp_ms, 1_000 + 86_400_000);
}

#[test]
fn timer_spec_stamps_identity_and_task_id_on_conversion() {
    let identity = identity();
    let spec = workflow_backoff(5_000);
    let task = spec.into_task(42, &identity);
    assert_eq!(task.task_id, 42);
    assert_eq!(task.domain_id, identity.domain_id);
    assert_eq!(task.fire_timestamp_ms, 5_000);
}
