use super::*;
use crate::decision_handler::DecisionTaskCompletionRequest;
use std::collections::HashMap;
use std::time::Duration;
use wfh_core::{Decision, DomainId, RequestId, SystemClock, TaskListName, WorkflowId, WorkflowType};
use wfh_storage::domain::{Domain, DomainReplicationConfig};
use wfh_storage::fakes::{
    FixedClusterMetadata, InMemoryDomainCache, InMemoryShard, InMemoryTimerQueueProcessor,
    InMemoryTransferQueueProcessor, InMemoryVisibility,
};
use wfh_storage::{DomainCache, WorkflowIdReusePolicy};

fn test_engine() -> Arc<Engine> {
    let shard = Arc::new(InMemoryShard::new(SystemClock));
    Engine::new(EngineComponents {
        shard: shard.clone(),
        history: shard.clone(),
        execution_manager: shard.clone(),
        visibility: Arc::new(InMemoryVisibility::new()),
        domain_cache: Arc::new(InMemoryDomainCache::new()),
        cluster: Arc::new(FixedClusterMetadata::new("cluster-a")),
        transfer_processor: Arc::new(InMemoryTransferQueueProcessor::new()),
        timer_processor: Arc::new(InMemoryTimerQueueProcessor::new()),
        config: ShardConfig::default(),
    })
}

fn start_request(workflow_id: &str) -> StartWorkflowRequest {
    StartWorkflowRequest {
        domain_id: DomainId::new("dom"),
        workflow_id: WorkflowId::new(workflow_id),
        workflow_type: WorkflowType { name: "demo".to_string() },
        task_list: TaskListName::new("tl"),
        input: HashMap::new(),
        execution_start_to_close_timeout_ms: 60_000,
        task_start_to_close_timeout_ms: 10_000,
        request_id: RequestId::new("start-1"),
        cron_schedule: None,
        retry_policy: None,
        workflow_id_reuse_policy: WorkflowIdReusePolicy::AllowDuplicate,
        parent: None,
        first_decision_task_backoff_seconds: 0,
        attempt: 0,
    }
}

#[tokio::test]
async fn start_workflow_schedules_a_first_decision_task() {
    let engine = test_engine();
    let run_id = engine.start_workflow(start_request("wf-1")).await.expect("start succeeds");

    let identity = ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf-1"), run_id);
    let snapshot = engine.get_mutable_state(identity, None, Duration::from_millis(50)).await.expect("snapshot");
    assert!(snapshot.is_running);
    assert_eq!(snapshot.next_event_id, EventId(3));
}

#[tokio::test]
async fn starting_twice_with_reject_duplicate_policy_fails() {
    let engine = test_engine();
    let mut req = start_request("wf-reject");
    req.workflow_id_reuse_policy = WorkflowIdReusePolicy::RejectDuplicate;
    engine.start_workflow(req.clone()).await.expect("first start succeeds");

    req.request_id = RequestId::new("start-2");
    let err = engine.start_workflow(req).await.expect_err("second start must be rejected");
    assert!(matches!(err, HistoryError::AlreadyStarted(_)));
}

#[tokio::test]
async fn starting_twice_with_same_request_id_is_idempotent() {
    let engine = test_engine();
    let req = start_request("wf-idempotent");
    let first = engine.start_workflow(req.clone()).await.expect("first start succeeds");
    let second = engine.start_workflow(req).await.expect("replay returns same run");
    assert_eq!(first, second);
}

#[tokio::test]
async fn signal_workflow_appends_signal_and_dedupes_by_request_id() {
    let engine = test_engine();
    let run_id = engine.start_workflow(start_request("wf-signal")).await.expect("start succeeds");
    let identity = ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf-signal"), run_id);

    let signal = SignalWorkflowRequest {
        domain_id: identity.domain_id.clone(),
        workflow_id: identity.workflow_id.clone(),
        run_id: Some(run_id),
        signal_name: "go".to_string(),
        input: "payload".to_string(),
        request_id: RequestId::new("signal-1"),
    };
    engine.signal_workflow(signal.clone()).await.expect("first signal applies");
    let before = engine.get_mutable_state(identity.clone(), None, Duration::from_millis(50)).await.expect("snapshot");

    engine.signal_workflow(signal).await.expect("replayed signal is a no-op");
    let after = engine.get_mutable_state(identity, None, Duration::from_millis(50)).await.expect("snapshot");
    assert_eq!(before.next_event_id, after.next_event_id);
}

#[tokio::test]
async fn respond_decision_task_completed_closes_workflow_on_complete_decision() {
    let engine = test_engine();
    let run_id = engine.start_workflow(start_request("wf-complete")).await.expect("start succeeds");
    let identity = ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf-complete"), run_id);

    let decision = engine
        .record_decision_task_started(identity.clone(), EventId(2), "poll-1".to_string())
        .await
        .expect("decision task starts");

    let response = engine
        .respond_decision_task_completed(
            identity.clone(),
            DecisionTaskCompletionRequest {
                schedule_id: decision.schedule_id,
                attempt: decision.attempt,
                decisions: vec![Decision::CompleteWorkflowExecution { result: "done".to_string() }],
                binary_checksum: None,
                sticky_attributes: None,
                return_new_decision_task: false,
            },
        )
        .await
        .expect("decision task completes");

    assert!(response.is_complete);
    let snapshot = engine.get_mutable_state(identity, None, Duration::from_millis(50)).await.expect("snapshot");
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.close_status, Some(CloseStatus::Completed));
}

#[tokio::test]
async fn terminate_workflow_execution_closes_a_running_execution() {
    let engine = test_engine();
    let run_id = engine.start_workflow(start_request("wf-terminate")).await.expect("start succeeds");
    let identity = ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf-terminate"), run_id);

    engine
        .terminate_workflow_execution(identity.clone(), "operator request".to_string(), String::new())
        .await
        .expect("terminate succeeds");

    let snapshot = engine.get_mutable_state(identity, None, Duration::from_millis(50)).await.expect("snapshot");
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.close_status, Some(CloseStatus::Terminated));
}

#[tokio::test]
async fn request_cancel_on_already_closed_execution_is_rejected() {
    let engine = test_engine();
    let run_id = engine.start_workflow(start_request("wf-cancel")).await.expect("start succeeds");
    let identity = ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf-cancel"), run_id);

    engine
        .terminate_workflow_execution(identity.clone(), "done".to_string(), String::new())
        .await
        .expect("terminate succeeds");

    let err = engine
        .request_cancel_workflow_execution(identity, "too late".to_string())
        .await
        .expect_err("cancel on a closed execution must fail");
    assert!(matches!(err, HistoryError::EntityNotExists(_)));
}

#[tokio::test]
async fn is_foreign_write_newer_is_false_for_non_global_domains() {
    let engine = test_engine();
    // A domain lookup that finds nothing (no domain registered) must not
    // block a local create — global-domain failover checks only apply once
    // a domain is actually known to be global.
    let domain_id = DomainId::new("unregistered");
    assert!(!engine.is_foreign_write_newer(&domain_id, 5).await);
}

#[tokio::test]
async fn signal_with_start_starts_a_fresh_run_with_the_signal_applied() {
    let engine = test_engine();
    let req = SignalWithStartRequest {
        start: start_request("wf-signal-with-start"),
        signal_name: "kickoff".to_string(),
        signal_input: "payload".to_string(),
    };
    let run_id = engine.signal_with_start(req).await.expect("signal-with-start succeeds");
    let identity = ExecutionIdentity::new(DomainId::new("dom"), WorkflowId::new("wf-signal-with-start"), run_id);
    let snapshot = engine.get_mutable_state(identity, None, Duration::from_millis(50)).await.expect("snapshot");
    assert!(snapshot.is_running);
    // WorkflowExecutionStarted + WorkflowExecutionSignaled + DecisionTaskScheduled.
    assert_eq!(snapshot.next_event_id, EventId(4));
}

#[tokio::test]
async fn domain_failover_coordinator_is_reachable_from_the_engine() {
    let engine = test_engine();
    let domain_cache = Arc::new(InMemoryDomainCache::new());
    let as_trait: Arc<dyn DomainCache> = domain_cache.clone();
    let _handle = engine.failover().register(&as_trait);
    domain_cache.upsert(Domain {
        domain_id: DomainId::new("dom"),
        name: "dom".to_string(),
        replication: DomainReplicationConfig {
            is_global_domain: true,
            active_cluster_name: "cluster-a".to_string(),
            clusters: vec!["cluster-a".to_string()],
        },
        failover_notification_version: 1,
        failover_version: 1,
    });
    // Registration and a domain change must not panic; the coordinator's own
    // locking behavior is covered in failover_tests.rs.
}
