use super::*;
use std::collections::HashMap;
use wfh_core::{DomainId, EventId, ExecutionIdentity, HistoryEvent, HistoryEventRecord, RunId, WorkflowId, WorkflowType};

fn started_record(request_id: &str) -> HistoryEventRecord {
    HistoryEventRecord::new(
        EventId::FIRST,
        1_000,
        HistoryEvent::WorkflowExecutionStarted {
            workflow_type: WorkflowType { name: "demo".to_string() },
            task_list: "tl".to_string(),
            input: HashMap::new(),
            execution_start_to_close_timeout_ms: 60_000,
            task_start_to_close_timeout_ms: 10_000,
            request_id: request_id.to_string(),
            cron_schedule: None,
            retry_policy: None,
            attempt: 0,
            parent_workflow: None,
            continued_from_run_id: None,
            first_decision_task_backoff_seconds: 0,
        },
    )
}

fn identity() -> ExecutionIdentity {
    ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf"), RunId::new())
}

#[tokio::test]
async fn create_then_read_history_round_trips() {
    let shard = InMemoryShard::new(wfh_core::SystemClock);
    let identity = identity();
    let record = started_record("req-1");
    let mutable_state = wfh_core::MutableState::new_from_start(identity.clone(), EventId::FIRST, 1_000, &record.event)
        .expect("valid start event");

    shard
        .create_workflow_execution(CreateWorkflowExecutionRequest {
            mode: CreateWorkflowMode::BrandNew,
            identity: identity.clone(),
            events: vec![record.clone()],
            mutable_state,
            transfer_tasks: vec![],
            timer_tasks: vec![],
        })
        .await
        .expect("first create succeeds");

    let history = shard.read_history_branch(&identity).await.expect("history exists");
    assert_eq!(history, vec![record]);
}

#[tokio::test]
async fn second_brand_new_create_conflicts() {
    let shard = InMemoryShard::new(wfh_core::SystemClock);
    let identity = identity();
    let record = started_record("req-1");
    let mutable_state = wfh_core::MutableState::new_from_start(identity.clone(), EventId::FIRST, 1_000, &record.event)
        .expect("valid start event");

    shard
        .create_workflow_execution(CreateWorkflowExecutionRequest {
            mode: CreateWorkflowMode::BrandNew,
            identity: identity.clone(),
            events: vec![record.clone()],
            mutable_state: mutable_state.clone(),
            transfer_tasks: vec![],
            timer_tasks: vec![],
        })
        .await
        .expect("first create succeeds");

    let other_identity = ExecutionIdentity::new(identity.domain_id.clone(), identity.workflow_id.clone(), RunId::new());
    let err = shard
        .create_workflow_execution(CreateWorkflowExecutionRequest {
            mode: CreateWorkflowMode::BrandNew,
            identity: other_identity,
            events: vec![record],
            mutable_state,
            transfer_tasks: vec![],
            timer_tasks: vec![],
        })
        .await
        .expect_err("second brand-new create for the same workflow ID must conflict");

    assert!(matches!(err, ShardError::AlreadyStarted(_)));
}

#[tokio::test]
async fn update_with_stale_condition_is_rejected() {
    let shard = InMemoryShard::new(wfh_core::SystemClock);
    let identity = identity();
    let record = started_record("req-1");
    let mutable_state = wfh_core::MutableState::new_from_start(identity.clone(), EventId::FIRST, 1_000, &record.event)
        .expect("valid start event");

    shard
        .create_workflow_execution(CreateWorkflowExecutionRequest {
            mode: CreateWorkflowMode::BrandNew,
            identity: identity.clone(),
            events: vec![record],
            mutable_state: mutable_state.clone(),
            transfer_tasks: vec![],
            timer_tasks: vec![],
        })
        .await
        .expect("create succeeds");

    let err = shard
        .update_workflow_execution(UpdateWorkflowExecutionRequest {
            identity,
            condition: EventId::FIRST,
            new_events: vec![],
            mutable_state,
            transfer_tasks: vec![],
            timer_tasks: vec![],
        })
        .await
        .expect_err("condition already behind stored next_event_id");

    assert!(matches!(err, ShardError::Conflict { .. }));
}

#[tokio::test]
async fn domain_cache_fires_callback_on_upsert() {
    let cache = InMemoryDomainCache::new();
    let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    cache.register_domain_change_callback(Arc::new(move |domains: &[Domain]| {
        seen_clone.lock().extend(domains.iter().map(|d| d.domain_id.clone()));
    }));

    let domain = Domain {
        domain_id: DomainId::new("dom"),
        name: "dom".to_string(),
        replication: DomainReplicationConfig {
            is_global_domain: false,
            active_cluster_name: "primary".to_string(),
            clusters: vec!["primary".to_string()],
        },
        failover_notification_version: 0,
        failover_version: 0,
    };
    cache.upsert(domain.clone());

    assert_eq!(seen.lock().clone(), vec![domain.domain_id]);
    assert_eq!(cache.get_domain("dom").await, Some(domain));
}

#[tokio::test]
async fn timer_queue_processor_sorts_received_by_fire_time() {
    let processor = InMemoryTimerQueueProcessor::new();
    let identity = identity();
    let late = TimerTask {
        task_id: 2,
        domain_id: identity.domain_id.clone(),
        workflow_id: identity.workflow_id.clone(),
        run_id: identity.run_id.clone(),
        fire_timestamp_ms: 200,
        kind: crate::tasks::TimerTaskKind::WorkflowTimeout,
    };
    let early = TimerTask {
        task_id: 1,
        domain_id: identity.domain_id.clone(),
        workflow_id: identity.workflow_id.clone(),
        run_id: identity.run_id,
        fire_timestamp_ms: 100,
        kind: crate::tasks::TimerTaskKind::WorkflowTimeout,
    };
    processor.notify_new_timers("primary", 0, vec![late.clone(), early.clone()]).await;

    assert_eq!(processor.received(), vec![early, late]);
}
