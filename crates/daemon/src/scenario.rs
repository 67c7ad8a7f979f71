// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scripted run through [`wfh_engine::Engine`] against the in-memory
//! `wfh-storage` fakes: start a workflow, signal it, drive one decision
//! task to completion with an activity scheduled, run the activity to
//! completion, then close the workflow on a second decision task. Exists
//! as a local smoke test for the engine façade in place of a real RPC
//! listener (out of scope per spec §1 Non-goals).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use wfh_core::{
    CloseStatus, Decision, DomainId, EventId, ExecutionIdentity, HistoryResult, RequestId, RetryPolicy, RunId,
    ShardConfig, SystemClock, TaskListName, WorkflowId, WorkflowType,
};
use wfh_engine::decision_handler::DecisionTaskCompletionRequest;
use wfh_engine::engine::{EngineComponents, SignalWorkflowRequest, StartWorkflowRequest};
use wfh_engine::Engine;
use wfh_storage::fakes::{
    FixedClusterMetadata, InMemoryDomainCache, InMemoryShard, InMemoryTimerQueueProcessor,
    InMemoryTransferQueueProcessor, InMemoryVisibility,
};
use wfh_storage::WorkflowIdReusePolicy;

/// What the scenario observed, for `main.rs` to print and for tests to
/// assert against.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub run_id: RunId,
    pub final_next_event_id: EventId,
    pub final_close_status: Option<CloseStatus>,
    pub metrics: wfh_engine::metrics::EngineMetricsSnapshot,
}

fn build_engine() -> Arc<Engine> {
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

/// Run the scenario to completion, returning what was observed at the end.
pub async fn run_scenario() -> HistoryResult<ScenarioOutcome> {
    let engine = build_engine();
    let domain_id = DomainId::new("scenario-domain");
    let workflow_id = WorkflowId::new("scenario-workflow");

    info!(%workflow_id, "starting workflow");
    let run_id = engine
        .start_workflow(StartWorkflowRequest {
            domain_id: domain_id.clone(),
            workflow_id: workflow_id.clone(),
            workflow_type: WorkflowType { name: "demo.Workflow".to_string() },
            task_list: TaskListName::new("demo-tasklist"),
            input: HashMap::new(),
            execution_start_to_close_timeout_ms: 300_000,
            task_start_to_close_timeout_ms: 10_000,
            request_id: RequestId::new("scenario-start"),
            cron_schedule: None,
            retry_policy: Some(RetryPolicy {
                initial_interval_ms: 1_000,
                backoff_coefficient: 2.0,
                maximum_interval_ms: 60_000,
                maximum_attempts: 3,
                non_retriable_error_reasons: Vec::new(),
            }),
            workflow_id_reuse_policy: WorkflowIdReusePolicy::AllowDuplicate,
            parent: None,
            first_decision_task_backoff_seconds: 0,
            attempt: 0,
        })
        .await?;
    let identity = ExecutionIdentity::new(domain_id.clone(), workflow_id.clone(), run_id);

    info!(%identity, "signaling workflow");
    engine
        .signal_workflow(SignalWorkflowRequest {
            domain_id: domain_id.clone(),
            workflow_id: workflow_id.clone(),
            run_id: Some(run_id),
            signal_name: "kickoff".to_string(),
            input: "{}".to_string(),
            request_id: RequestId::new("scenario-signal"),
        })
        .await?;

    let first_decision = engine
        .record_decision_task_started(identity.clone(), EventId(2), "scenario-poll-1".to_string())
        .await?;

    info!(schedule_id = ?first_decision.schedule_id, "scheduling activity from first decision task");
    engine
        .respond_decision_task_completed(
            identity.clone(),
            DecisionTaskCompletionRequest {
                schedule_id: first_decision.schedule_id,
                attempt: first_decision.attempt,
                decisions: vec![Decision::ScheduleActivityTask {
                    activity_id: "activity-1".to_string(),
                    activity_type: "demo.DoWork".to_string(),
                    task_list: TaskListName::new("demo-tasklist"),
                    input: "{}".to_string(),
                    schedule_to_close_timeout_ms: 60_000,
                    schedule_to_start_timeout_ms: 10_000,
                    start_to_close_timeout_ms: 30_000,
                    heartbeat_timeout_ms: 0,
                    retry_policy: None,
                }],
                binary_checksum: None,
                sticky_attributes: None,
                return_new_decision_task: false,
            },
        )
        .await?;

    // A real deployment learns the schedule ID from the transfer-queue task
    // dispatched to a worker; here we read it straight back off the
    // snapshot, since `ActivityTaskScheduled` is always the last event the
    // decision batch just appended.
    let after_schedule = engine.get_mutable_state(identity.clone(), None, Duration::from_millis(50)).await?;
    let activity_schedule_id = EventId(after_schedule.next_event_id.0 - 1);
    let activity = engine
        .record_activity_task_started(identity.clone(), activity_schedule_id, "scenario-activity-poll".to_string(), 0)
        .await?;
    info!(activity_id = %activity.activity_id, "activity started");

    engine.respond_activity_task_completed(identity.clone(), activity.schedule_id, "{\"ok\":true}".to_string()).await?;

    let after_activity = engine.get_mutable_state(identity.clone(), None, Duration::from_millis(50)).await?;
    let second_decision_schedule_id = EventId(after_activity.next_event_id.0 - 1);
    let second_decision = engine
        .record_decision_task_started(identity.clone(), second_decision_schedule_id, "scenario-poll-2".to_string())
        .await?;

    info!("completing workflow from second decision task");
    engine
        .respond_decision_task_completed(
            identity.clone(),
            DecisionTaskCompletionRequest {
                schedule_id: second_decision.schedule_id,
                attempt: second_decision.attempt,
                decisions: vec![Decision::CompleteWorkflowExecution { result: "{\"status\":\"ok\"}".to_string() }],
                binary_checksum: None,
                sticky_attributes: None,
                return_new_decision_task: false,
            },
        )
        .await?;

    let snapshot = engine.get_mutable_state(identity, None, Duration::from_millis(50)).await?;

    Ok(ScenarioOutcome {
        run_id,
        final_next_event_id: snapshot.next_event_id,
        final_close_status: snapshot.close_status,
        metrics: engine.metrics().snapshot(),
    })
}

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod tests;
