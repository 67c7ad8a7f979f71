// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Engine`: the request façade (§4.4-§4.8) that ties the OCC loop,
//! decision handler, timer builder, and domain-failover coordinator
//! together for an external caller — a daemon's RPC surface, or the
//! scenario runner in `wfh-daemon`.
//!
//! Grounded on the teacher's `Runtime<A, N, C>` shape
//! (`daemon/src/engine/runtime/mod.rs`): a constructor taking every
//! collaborator handle up front, and one async method per externally
//! triggered operation, each of which either runs a single OCC mutation
//! or (for start/continue-as-new) builds a brand-new run and hands it to
//! storage directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use wfh_core::{
    CloseStatus, DomainId, EventId, ExecutionIdentity, HistoryError, HistoryEvent, HistoryEventRecord,
    HistoryResult, MutableState, RequestId, RetryPolicy, RunId, ShardConfig, TaskListName, WorkflowId,
    WorkflowType,
};
use wfh_storage::{
    ClusterMetadata, CreateWorkflowExecutionRequest, CreateWorkflowMode, CurrentExecutionRecord, DomainCache,
    ExecutionManager, ShardContext, ShardError, TimerQueueProcessor, TransferQueueProcessor, TransferTaskKind,
    VisibilityManager, WorkflowIdReusePolicy,
};

use crate::decision_handler::{self, ContinueAsNewSpec, DecisionTaskCompletionRequest, InlineDecisionTask};
use crate::execution_cache::ExecutionCache;
use crate::failover::FailoverCoordinator;
use crate::metrics::EngineMetrics;
use crate::notifier::{HistoryEventNotifier, NotifierState};
use crate::occ::{MutationOutcome, OccRuntime, TransferSpec, DEFAULT_RETENTION_MS};
use crate::timer_builder::{self, TimerSpec};

/// Everything [`Engine::new`] needs constructed up front, grouped so the
/// constructor doesn't take a dozen loose positional `Arc`s.
pub struct EngineComponents {
    pub shard: Arc<dyn ShardContext>,
    pub history: Arc<dyn wfh_storage::HistoryManager>,
    pub execution_manager: Arc<dyn ExecutionManager>,
    pub visibility: Arc<dyn VisibilityManager>,
    pub domain_cache: Arc<dyn DomainCache>,
    pub cluster: Arc<dyn ClusterMetadata>,
    pub transfer_processor: Arc<dyn TransferQueueProcessor>,
    pub timer_processor: Arc<dyn TimerQueueProcessor>,
    pub config: ShardConfig,
}

#[derive(Debug, Clone)]
pub struct StartWorkflowRequest {
    pub domain_id: DomainId,
    pub workflow_id: WorkflowId,
    pub workflow_type: WorkflowType,
    pub task_list: TaskListName,
    pub input: HashMap<String, String>,
    pub execution_start_to_close_timeout_ms: u64,
    pub task_start_to_close_timeout_ms: u64,
    pub request_id: RequestId,
    pub cron_schedule: Option<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub workflow_id_reuse_policy: WorkflowIdReusePolicy,
    pub parent: Option<(WorkflowId, RunId)>,
    pub first_decision_task_backoff_seconds: u32,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub struct SignalWorkflowRequest {
    pub domain_id: DomainId,
    pub workflow_id: WorkflowId,
    pub run_id: Option<RunId>,
    pub signal_name: String,
    pub input: String,
    pub request_id: RequestId,
}

#[derive(Debug, Clone)]
pub struct SignalWithStartRequest {
    pub start: StartWorkflowRequest,
    pub signal_name: String,
    pub signal_input: String,
}

#[derive(Debug, Clone)]
pub struct RespondDecisionTaskCompletedResponse {
    pub is_complete: bool,
    pub new_decision_schedule_id: Option<EventId>,
    pub inline_poll: Option<InlineDecisionTask>,
    /// §4.3 `MultipleCompletionDecisions`: completion-type decisions in
    /// this batch that were ignored because the workflow had already
    /// closed earlier in the same batch.
    pub multiple_completion_decisions: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct GetMutableStateResponse {
    pub next_event_id: EventId,
    pub is_running: bool,
    pub close_status: Option<CloseStatus>,
}

/// Ties the OCC loop, decision handler and timer builder to a concrete set
/// of collaborators, and exposes one method per workflow-history
/// operation this shard accepts.
pub struct Engine {
    occ: OccRuntime,
    execution_manager: Arc<dyn ExecutionManager>,
    visibility: Arc<dyn VisibilityManager>,
    domain_cache: Arc<dyn DomainCache>,
    cluster: Arc<dyn ClusterMetadata>,
    config: ShardConfig,
    failover: Arc<FailoverCoordinator>,
}

impl Engine {
    pub fn new(components: EngineComponents) -> Arc<Self> {
        let EngineComponents {
            shard,
            history,
            execution_manager,
            visibility,
            domain_cache,
            cluster,
            transfer_processor,
            timer_processor,
            config,
        } = components;

        let cache = Arc::new(ExecutionCache::new(config.execution_cache_capacity));
        let notifier = Arc::new(HistoryEventNotifier::new());
        let metrics = Arc::new(EngineMetrics::new());
        let occ = OccRuntime {
            shard: shard.clone(),
            history,
            cache,
            notifier,
            metrics,
            conditional_retry_count: config.conditional_retry_count,
            lease_timeout: config.execution_lease_timeout(),
        };
        let failover = FailoverCoordinator::new(shard, transfer_processor, timer_processor, cluster.clone());

        let engine = Arc::new(Self {
            occ,
            execution_manager,
            visibility,
            domain_cache: domain_cache.clone(),
            cluster,
            config,
            failover: failover.clone(),
        });
        failover.register(&domain_cache);
        engine
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.occ.metrics
    }

    pub fn visibility(&self) -> &Arc<dyn VisibilityManager> {
        &self.visibility
    }

    pub fn failover(&self) -> &Arc<FailoverCoordinator> {
        &self.failover
    }

    async fn now_ms(&self) -> i64 {
        self.occ.shard.get_current_time(self.cluster.get_current_cluster_name()).await
    }

    fn validate_id_length(&self, value: &str, field: &str) -> HistoryResult<()> {
        if value.is_empty() {
            return Err(HistoryError::bad_request(format!("{field} must not be empty")));
        }
        if value.len() > self.config.max_id_length_limit {
            return Err(HistoryError::bad_request(format!("{field} exceeds max_id_length_limit")));
        }
        Ok(())
    }

    fn validate_start_request(&self, req: &StartWorkflowRequest) -> HistoryResult<()> {
        self.validate_id_length(req.domain_id.as_str(), "domain_id")?;
        self.validate_id_length(req.workflow_id.as_str(), "workflow_id")?;
        self.validate_id_length(req.task_list.as_str(), "task_list")?;
        if req.workflow_type.name.is_empty() {
            return Err(HistoryError::bad_request("workflow_type must not be empty"));
        }
        if req.execution_start_to_close_timeout_ms == 0 {
            return Err(HistoryError::bad_request("execution_start_to_close_timeout_ms must be positive"));
        }
        if req.task_start_to_close_timeout_ms == 0 {
            return Err(HistoryError::bad_request("task_start_to_close_timeout_ms must be positive"));
        }
        if let Some(policy) = &req.retry_policy {
            if policy.initial_interval_ms == 0 {
                return Err(HistoryError::bad_request("retry_policy.initial_interval_ms must be positive"));
            }
            if policy.backoff_coefficient < 1.0 {
                return Err(HistoryError::bad_request("retry_policy.backoff_coefficient must be >= 1.0"));
            }
        }
        Ok(())
    }

    /// `StartWorkflowExecution` (§4.4): builds the first event, the initial
    /// mutable state, and whatever tasks follow from it, then persists
    /// through [`Self::create_with_reuse`] so the workflow-ID reuse policy
    /// and the idempotent-timeout handling apply uniformly with
    /// `SignalWithStartWorkflowExecution`'s not-running branch.
    pub async fn start_workflow(&self, req: StartWorkflowRequest) -> HistoryResult<RunId> {
        self.validate_start_request(&req)?;
        self.start_workflow_inner(req, None).await
    }

    /// `SignalWithStartWorkflowExecution` (§4.4): signals the current run
    /// if one is active, applies the reuse policy and starts a fresh run
    /// (with the signal appended right after `WorkflowExecutionStarted`)
    /// otherwise.
    pub async fn signal_with_start(&self, req: SignalWithStartRequest) -> HistoryResult<RunId> {
        self.validate_start_request(&req.start)?;
        let existing =
            self.execution_manager.get_current_execution(&req.start.domain_id, &req.start.workflow_id).await;
        if let Some(rec) = &existing {
            if rec.is_running {
                let identity = ExecutionIdentity::new(
                    req.start.domain_id.clone(),
                    req.start.workflow_id.clone(),
                    rec.run_id,
                );
                let now_ms = self.now_ms().await;
                let config = self.config.clone();
                let signal_name = req.signal_name.clone();
                let input = req.signal_input.clone();
                let request_id = req.start.request_id.clone();
                self.occ
                    .run_mutation(&identity, move |state| {
                        signal_mutation(state, &config, &signal_name, &input, &request_id, now_ms)
                    })
                    .await?;
                return Ok(rec.run_id);
            }
            check_reuse_policy(req.start.workflow_id_reuse_policy, rec)?;
        }
        let signal_request_id = req.start.request_id.clone();
        self.start_workflow_inner(req.start, Some((req.signal_name, req.signal_input, signal_request_id))).await
    }

    /// Shared by `start_workflow` and `signal_with_start`'s not-running
    /// branch: `extra_signal`, when present, appends a
    /// `WorkflowExecutionSignaled` event right after
    /// `WorkflowExecutionStarted`, before the first decision task is
    /// scheduled.
    async fn start_workflow_inner(
        &self,
        req: StartWorkflowRequest,
        extra_signal: Option<(String, String, RequestId)>,
    ) -> HistoryResult<RunId> {
        let now_ms = self.now_ms().await;
        let run_id = RunId::new();
        let identity = ExecutionIdentity::new(req.domain_id.clone(), req.workflow_id.clone(), run_id);
        debug!(%identity, "starting workflow execution");

        let skip_first_decision = req.parent.is_some() || req.first_decision_task_backoff_seconds > 0;

        let started_event = HistoryEvent::WorkflowExecutionStarted {
            workflow_type: req.workflow_type.clone(),
            task_list: req.task_list.to_string(),
            input: req.input.clone(),
            execution_start_to_close_timeout_ms: req.execution_start_to_close_timeout_ms,
            task_start_to_close_timeout_ms: req.task_start_to_close_timeout_ms,
            request_id: req.request_id.to_string(),
            cron_schedule: req.cron_schedule.clone(),
            retry_policy: req.retry_policy.clone(),
            attempt: req.attempt,
            parent_workflow: req.parent.clone(),
            continued_from_run_id: None,
            first_decision_task_backoff_seconds: req.first_decision_task_backoff_seconds,
        };
        let mut state = MutableState::new_from_start(identity.clone(), EventId::FIRST, now_ms, &started_event)?;
        let mut events = vec![HistoryEventRecord::new(EventId::FIRST, now_ms, started_event)];
        let mut timer_tasks: Vec<TimerSpec> = Vec::new();
        let mut transfer_tasks: Vec<TransferSpec> =
            vec![TransferSpec { kind: TransferTaskKind::RecordWorkflowStarted }];

        if req.first_decision_task_backoff_seconds > 0 {
            let backoff_ms = req.first_decision_task_backoff_seconds as i64 * 1000;
            state.execution_info.workflow_expiration_timestamp_ms =
                state.execution_info.workflow_expiration_timestamp_ms.map(|t| t + backoff_ms);
            timer_tasks.push(timer_builder::workflow_backoff(now_ms + backoff_ms));
        }

        if let Some((signal_name, input, signal_request_id)) = extra_signal {
            let signal_events = state.record_live_event(
                HistoryEvent::WorkflowExecutionSignaled {
                    signal_name,
                    input,
                    request_id: signal_request_id.to_string(),
                },
                now_ms,
            )?;
            events.extend(signal_events);
        }

        if !skip_first_decision {
            let (sched_events, _schedule_id, transfer, timeout_timer, sticky_timer) =
                decision_handler::schedule_decision_task(&mut state, now_ms)?;
            events.extend(sched_events);
            transfer_tasks.push(transfer);
            timer_tasks.push(timeout_timer);
            if let Some(t) = sticky_timer {
                timer_tasks.push(t);
            }
        }

        if let Some(fire) = timer_builder::workflow_timeout(&state) {
            timer_tasks.push(fire);
        }

        self.create_with_reuse(
            identity,
            CreateWorkflowMode::BrandNew,
            events,
            state,
            transfer_tasks,
            timer_tasks,
            &req.request_id,
            req.workflow_id_reuse_policy,
            run_id,
        )
        .await
    }

    /// Persist a brand-new run, retrying with `WorkflowIdReuse` when the
    /// current record allows it (§4.7), bounded by
    /// `conditional_retry_count`. A persistence timeout is treated as
    /// success (§4.4/§9): the attempted run is returned without deleting
    /// the history it may or may not have actually written, since leaking
    /// orphaned history is preferred over discarding a possibly-successful
    /// write.
    #[allow(clippy::too_many_arguments)]
    async fn create_with_reuse(
        &self,
        identity: ExecutionIdentity,
        initial_mode: CreateWorkflowMode,
        events: Vec<HistoryEventRecord>,
        state: MutableState,
        transfer_specs: Vec<TransferSpec>,
        timer_specs: Vec<TimerSpec>,
        request_id: &RequestId,
        reuse_policy: WorkflowIdReusePolicy,
        run_id: RunId,
    ) -> HistoryResult<RunId> {
        let mut mode = initial_mode;
        for _attempt in 0..self.config.conditional_retry_count {
            let mut transfer_tasks = Vec::with_capacity(transfer_specs.len());
            for spec in transfer_specs.clone() {
                let task_id = self.occ.shard.get_next_transfer_task_id().await;
                transfer_tasks.push(spec.into_task(task_id, &identity));
            }
            let mut timer_tasks = Vec::with_capacity(timer_specs.len());
            for spec in timer_specs.clone() {
                let task_id = self.occ.shard.get_next_transfer_task_id().await;
                timer_tasks.push(spec.into_task(task_id, &identity));
            }

            let result = self
                .occ
                .shard
                .create_workflow_execution(CreateWorkflowExecutionRequest {
                    mode,
                    identity: identity.clone(),
                    events: events.clone(),
                    mutable_state: state.clone(),
                    transfer_tasks,
                    timer_tasks,
                })
                .await;

            match result {
                Ok(()) => {
                    self.occ.notifier.notify(
                        &identity,
                        NotifierState { next_event_id: state.next_event_id, is_closed: state.is_closed() },
                    );
                    return Ok(run_id);
                }
                Err(ShardError::AlreadyStarted(rec)) => {
                    if rec.start_request_id.as_str() == request_id.as_str() {
                        return Ok(rec.run_id);
                    }
                    if self.is_foreign_write_newer(&identity.domain_id, rec.last_write_version).await {
                        self.cleanup_orphan(&identity).await;
                        return Err(HistoryError::DomainNotActive(format!(
                            "domain {} is active on another cluster",
                            identity.domain_id
                        )));
                    }
                    if let Err(e) = check_reuse_policy(reuse_policy, &rec) {
                        self.cleanup_orphan(&identity).await;
                        return Err(e);
                    }
                    mode = CreateWorkflowMode::WorkflowIdReuse { previous_run_id: rec.run_id };
                }
                Err(ShardError::Timeout) => {
                    return Ok(run_id);
                }
                Err(other) => {
                    self.cleanup_orphan(&identity).await;
                    return Err(map_create_error(other));
                }
            }
        }
        self.cleanup_orphan(&identity).await;
        Err(HistoryError::MaxAttemptsExceeded)
    }

    async fn cleanup_orphan(&self, identity: &ExecutionIdentity) {
        let _ = self.occ.history.delete_history_branch(identity).await;
    }

    /// Whether the current record on file was written by a cluster that
    /// has since become the domain's active cluster for a version newer
    /// than ours — i.e. we'd be overwriting a foreign write we haven't
    /// failed over to yet (§4.8).
    async fn is_foreign_write_newer(&self, domain_id: &DomainId, last_write_version: i64) -> bool {
        match self.domain_cache.get_domain_by_id(domain_id).await {
            Some(domain) if domain.replication.is_global_domain => last_write_version > domain.failover_version,
            _ => false,
        }
    }

    async fn resolve_identity(
        &self,
        domain_id: &DomainId,
        workflow_id: &WorkflowId,
        run_id: Option<RunId>,
    ) -> HistoryResult<ExecutionIdentity> {
        match run_id {
            Some(run_id) => Ok(ExecutionIdentity::new(domain_id.clone(), workflow_id.clone(), run_id)),
            None => {
                let rec = self
                    .execution_manager
                    .get_current_execution(domain_id, workflow_id)
                    .await
                    .ok_or_else(|| HistoryError::entity_not_exists("no execution found for workflow_id"))?;
                Ok(ExecutionIdentity::new(domain_id.clone(), workflow_id.clone(), rec.run_id))
            }
        }
    }

    /// `SignalWorkflowExecution`: append a signal to a running execution,
    /// deduplicated by request ID, scheduling a new decision task if none
    /// is outstanding.
    pub async fn signal_workflow(&self, req: SignalWorkflowRequest) -> HistoryResult<()> {
        self.validate_id_length(req.domain_id.as_str(), "domain_id")?;
        self.validate_id_length(req.workflow_id.as_str(), "workflow_id")?;
        let identity = self.resolve_identity(&req.domain_id, &req.workflow_id, req.run_id).await?;
        let now_ms = self.now_ms().await;
        let config = self.config.clone();
        let signal_name = req.signal_name.clone();
        let input = req.input.clone();
        let request_id = req.request_id.clone();
        self.occ
            .run_mutation(&identity, move |state| {
                signal_mutation(state, &config, &signal_name, &input, &request_id, now_ms)
            })
            .await
    }

    /// `RequestCancelWorkflowExecution`: records a cancel request (not a
    /// terminal event — the decider still chooses how to respond to it),
    /// scheduling a new decision task if none is outstanding.
    pub async fn request_cancel_workflow_execution(
        &self,
        identity: ExecutionIdentity,
        cause: String,
    ) -> HistoryResult<()> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if state.is_closed() {
                    return Err(HistoryError::entity_not_exists("workflow already completed"));
                }
                let mut outcome = MutationOutcome::new(());
                let events = state.record_live_event(
                    HistoryEvent::WorkflowExecutionCancelRequested { cause: cause.clone() },
                    now_ms,
                )?;
                outcome.new_events = events;
                schedule_follow_up_decision_if_idle(state, now_ms, &mut outcome)?;
                Ok(outcome)
            })
            .await
    }

    /// `TerminateWorkflowExecution`: an unconditional, worker-independent
    /// close. No decision task is scheduled — the run is simply done.
    pub async fn terminate_workflow_execution(
        &self,
        identity: ExecutionIdentity,
        reason: String,
        details: String,
    ) -> HistoryResult<()> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if state.is_closed() {
                    return Err(HistoryError::entity_not_exists("workflow already completed"));
                }
                let mut outcome = MutationOutcome::new(());
                let events = state.record_live_event(
                    HistoryEvent::WorkflowExecutionTerminated { reason: reason.clone(), details: details.clone() },
                    now_ms,
                )?;
                outcome.new_events = events;
                outcome.transfer_tasks.push(TransferSpec { kind: TransferTaskKind::CloseExecution });
                outcome.timer_tasks.push(timer_builder::retention_delete(now_ms, DEFAULT_RETENTION_MS));
                Ok(outcome)
            })
            .await
    }

    /// Reset a run to one of its recorded auto-reset points (§3): closes
    /// the current run (if still open) with a `TerminateWorkflowExecution`-
    /// style close, then starts a fresh run replaying the original start
    /// attributes. §1 lists reset among the accepted request kinds but §4
    /// never goes beyond the auto-reset-point bookkeeping the decision
    /// handler maintains; this is the engine's own resolution, recorded as
    /// an Open Question decision in DESIGN.md. Replaying history up to the
    /// reset point (so the new run starts with the old run's partial
    /// progress already applied) is out of scope here — the new run starts
    /// clean, same as a fresh `StartWorkflowExecution`.
    pub async fn reset_workflow_execution(
        &self,
        identity: ExecutionIdentity,
        reset_to_event_id: EventId,
        reason: String,
    ) -> HistoryResult<RunId> {
        let records = self
            .occ
            .history
            .read_history_branch(&identity)
            .await
            .map_err(|e| HistoryError::entity_not_exists(e.to_string()))?;
        let state = MutableState::rebuild_from_history(identity.clone(), &records)?;
        if !state.execution_info.auto_reset_points.iter().any(|p| p.event_id == reset_to_event_id) {
            return Err(HistoryError::bad_request("reset point not found"));
        }

        if !state.is_closed() {
            self.terminate_workflow_execution(identity.clone(), "ResetWorkflowExecution".to_string(), reason)
                .await?;
        }

        let restart = StartWorkflowRequest {
            domain_id: identity.domain_id.clone(),
            workflow_id: identity.workflow_id.clone(),
            workflow_type: state.execution_info.workflow_type.clone(),
            task_list: state.execution_info.task_list.clone(),
            input: HashMap::new(),
            execution_start_to_close_timeout_ms: state.execution_info.execution_start_to_close_timeout_ms,
            task_start_to_close_timeout_ms: state.execution_info.task_start_to_close_timeout_ms,
            request_id: RequestId::new(format!("reset-{}", identity.run_id)),
            cron_schedule: state.execution_info.cron_schedule.clone(),
            retry_policy: state.execution_info.retry_policy.clone(),
            workflow_id_reuse_policy: WorkflowIdReusePolicy::AllowDuplicate,
            parent: state.execution_info.parent.clone(),
            first_decision_task_backoff_seconds: 0,
            attempt: 0,
        };
        self.start_workflow(restart).await
    }

    /// `RecordDecisionTaskStarted` (§4.5): idempotent on a matching
    /// `request_id` replay, otherwise appends `DecisionTaskStarted`.
    pub async fn record_decision_task_started(
        &self,
        identity: ExecutionIdentity,
        schedule_id: EventId,
        request_id: String,
    ) -> HistoryResult<wfh_core::DecisionInfo> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if schedule_id.0 >= state.next_event_id.0 {
                    return Err(HistoryError::bad_request("schedule_id refers to an event beyond current history"));
                }
                let decision = state
                    .pending_decision
                    .clone()
                    .filter(|d| d.schedule_id == schedule_id)
                    .ok_or_else(|| HistoryError::entity_not_exists("no pending decision for schedule id"))?;
                if let Some(existing_request_id) = &decision.request_id {
                    if existing_request_id == &request_id {
                        return Ok(MutationOutcome::new(decision));
                    }
                    return Err(HistoryError::already_started("decision task already started"));
                }
                let events = state.record_live_event(
                    HistoryEvent::DecisionTaskStarted { scheduled_event_id: schedule_id, request_id: request_id.clone() },
                    now_ms,
                )?;
                #[allow(clippy::expect_used)]
                let mut outcome =
                    MutationOutcome::new(state.pending_decision.clone().expect("just started above"));
                outcome.new_events = events;
                Ok(outcome)
            })
            .await
    }

    /// `RecordActivityTaskStarted` (§4.5): idempotent on a matching
    /// `request_id` replay, otherwise appends `ActivityTaskStarted`.
    pub async fn record_activity_task_started(
        &self,
        identity: ExecutionIdentity,
        schedule_id: EventId,
        request_id: String,
        attempt: u32,
    ) -> HistoryResult<wfh_core::ActivityInfo> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if schedule_id.0 >= state.next_event_id.0 {
                    return Err(HistoryError::bad_request("schedule_id refers to an event beyond current history"));
                }
                let activity = state
                    .pending_activities
                    .get(&schedule_id)
                    .cloned()
                    .ok_or_else(|| HistoryError::entity_not_exists("no pending activity for schedule id"))?;
                if let Some(existing_request_id) = &activity.request_id {
                    if existing_request_id == &request_id {
                        return Ok(MutationOutcome::new(activity));
                    }
                    return Err(HistoryError::already_started("activity task already started"));
                }
                let events = state.record_live_event(
                    HistoryEvent::ActivityTaskStarted {
                        scheduled_event_id: schedule_id,
                        request_id: request_id.clone(),
                        attempt,
                    },
                    now_ms,
                )?;
                #[allow(clippy::expect_used)]
                let mut outcome = MutationOutcome::new(
                    state.pending_activities.get(&schedule_id).cloned().expect("just started above"),
                );
                outcome.new_events = events;
                Ok(outcome)
            })
            .await
    }

    /// `RecordActivityTaskHeartbeat` (§4.5): updates heartbeat bookkeeping
    /// without appending a history event, returning whether a cancellation
    /// has been requested so the worker can abort.
    pub async fn record_activity_task_heartbeat(
        &self,
        identity: ExecutionIdentity,
        schedule_id: EventId,
        details: Option<String>,
    ) -> HistoryResult<bool> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                let activity = state
                    .pending_activities
                    .get_mut(&schedule_id)
                    .ok_or_else(|| HistoryError::entity_not_exists("no pending activity for schedule id"))?;
                activity.last_heartbeat_timestamp_ms = Some(now_ms);
                activity.last_heartbeat_details = details.clone();
                Ok(MutationOutcome::new(activity.cancel_requested))
            })
            .await
    }

    /// `RespondActivityTaskCompleted` (§4.5).
    pub async fn respond_activity_task_completed(
        &self,
        identity: ExecutionIdentity,
        schedule_id: EventId,
        result: String,
    ) -> HistoryResult<()> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if schedule_id.0 >= state.next_event_id.0 {
                    return Err(HistoryError::bad_request("schedule_id refers to an event beyond current history"));
                }
                let started_id = state
                    .pending_activities
                    .get(&schedule_id)
                    .ok_or_else(|| HistoryError::entity_not_exists("no pending activity for schedule id"))?
                    .started_id
                    .ok_or_else(|| HistoryError::entity_not_exists("activity not started"))?;
                let mut outcome = MutationOutcome::new(());
                let events = state.record_live_event(
                    HistoryEvent::ActivityTaskCompleted {
                        scheduled_event_id: schedule_id,
                        started_event_id: started_id,
                        result: result.clone(),
                    },
                    now_ms,
                )?;
                outcome.new_events = events;
                schedule_follow_up_decision_if_idle(state, now_ms, &mut outcome)?;
                Ok(outcome)
            })
            .await
    }

    /// `RespondActivityTaskFailed` (§4.5): re-dispatches under the same
    /// schedule ID via a retry-backoff timer when the activity's retry
    /// policy still allows another attempt; otherwise records a terminal
    /// `ActivityTaskFailed`.
    pub async fn respond_activity_task_failed(
        &self,
        identity: ExecutionIdentity,
        schedule_id: EventId,
        reason: String,
        details: String,
    ) -> HistoryResult<()> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if schedule_id.0 >= state.next_event_id.0 {
                    return Err(HistoryError::bad_request("schedule_id refers to an event beyond current history"));
                }
                let activity = state
                    .pending_activities
                    .get(&schedule_id)
                    .cloned()
                    .ok_or_else(|| HistoryError::entity_not_exists("no pending activity for schedule id"))?;
                let started_id =
                    activity.started_id.ok_or_else(|| HistoryError::entity_not_exists("activity not started"))?;

                let backoff = activity
                    .retry_policy
                    .as_ref()
                    .and_then(|policy| decision_handler::retry_backoff_seconds(policy, activity.attempt, &reason));

                let mut outcome = MutationOutcome::new(());
                match backoff {
                    Some(seconds) => {
                        #[allow(clippy::expect_used)]
                        let pending =
                            state.pending_activities.get_mut(&schedule_id).expect("checked above");
                        pending.attempt += 1;
                        pending.started_id = None;
                        pending.request_id = None;
                        let fire_timestamp_ms = now_ms + seconds as i64 * 1000;
                        outcome.timer_tasks.push(timer_builder::activity_retry_backoff(pending, fire_timestamp_ms));
                    }
                    None => {
                        let events = state.record_live_event(
                            HistoryEvent::ActivityTaskFailed {
                                scheduled_event_id: schedule_id,
                                started_event_id: started_id,
                                reason: reason.clone(),
                                details: details.clone(),
                            },
                            now_ms,
                        )?;
                        outcome.new_events = events;
                        schedule_follow_up_decision_if_idle(state, now_ms, &mut outcome)?;
                    }
                }
                Ok(outcome)
            })
            .await
    }

    /// `RespondActivityTaskCanceled` (§4.5).
    pub async fn respond_activity_task_canceled(
        &self,
        identity: ExecutionIdentity,
        schedule_id: EventId,
        details: String,
    ) -> HistoryResult<()> {
        let now_ms = self.now_ms().await;
        self.occ
            .run_mutation(&identity, move |state| {
                if schedule_id.0 >= state.next_event_id.0 {
                    return Err(HistoryError::bad_request("schedule_id refers to an event beyond current history"));
                }
                let started_id = state
                    .pending_activities
                    .get(&schedule_id)
                    .ok_or_else(|| HistoryError::entity_not_exists("no pending activity for schedule id"))?
                    .started_id;
                let mut outcome = MutationOutcome::new(());
                let events = state.record_live_event(
                    HistoryEvent::ActivityTaskCanceled {
                        scheduled_event_id: schedule_id,
                        started_event_id: started_id,
                        details: details.clone(),
                    },
                    now_ms,
                )?;
                outcome.new_events = events;
                schedule_follow_up_decision_if_idle(state, now_ms, &mut outcome)?;
                Ok(outcome)
            })
            .await
    }

    /// `RespondDecisionTaskCompleted` (§4.3): runs the decision batch
    /// through [`decision_handler::handle_decision_task_completed`] inside
    /// one OCC mutation, then — if the batch closed with a continue-as-new
    /// — materializes the successor run as a separate, brand-new
    /// `ExecutionIdentity` once the closing mutation has persisted.
    pub async fn respond_decision_task_completed(
        &self,
        identity: ExecutionIdentity,
        req: DecisionTaskCompletionRequest,
    ) -> HistoryResult<RespondDecisionTaskCompletedResponse> {
        let now_ms = self.now_ms().await;
        let config = self.config.clone();
        let mut continue_as_new: Option<ContinueAsNewSpec> = None;
        let decisions_count = req.decisions.len() as u64;

        let result = {
            let continue_as_new = &mut continue_as_new;
            self.occ
                .run_mutation(&identity, move |state| {
                    let (outcome, spec) =
                        decision_handler::handle_decision_task_completed(state, req.clone(), now_ms, &config)?;
                    *continue_as_new = spec;
                    Ok(outcome)
                })
                .await?
        };

        self.occ.metrics.record_decisions_processed(decisions_count);
        if result.multiple_completion_decisions > 0 {
            self.occ.metrics.record_multiple_completion_decisions(result.multiple_completion_decisions as u64);
        }

        if let Some(spec) = continue_as_new {
            self.create_continuation(&identity, spec).await?;
        }

        Ok(RespondDecisionTaskCompletedResponse {
            is_complete: result.is_complete,
            new_decision_schedule_id: result.new_decision_schedule_id,
            inline_poll: result.inline_poll,
            multiple_completion_decisions: result.multiple_completion_decisions,
        })
    }

    /// Materialize a continue-as-new successor: a brand-new run under a
    /// fresh `RunId` (already chosen and embedded in the just-persisted
    /// `WorkflowExecutionContinuedAsNew` event via
    /// [`ContinueAsNewSpec::new_run_id`]), starting either with a
    /// `WorkflowBackoffTimerTask` (cron/retry delay) or an immediate first
    /// decision task.
    async fn create_continuation(&self, previous_identity: &ExecutionIdentity, spec: ContinueAsNewSpec) -> HistoryResult<()> {
        let now_ms = self.now_ms().await;
        let new_identity = ExecutionIdentity::new(
            previous_identity.domain_id.clone(),
            previous_identity.workflow_id.clone(),
            spec.new_run_id,
        );
        let started_event = HistoryEvent::WorkflowExecutionStarted {
            workflow_type: spec.workflow_type.clone(),
            task_list: spec.task_list.to_string(),
            input: spec.input.clone(),
            execution_start_to_close_timeout_ms: spec.execution_start_to_close_timeout_ms,
            task_start_to_close_timeout_ms: spec.task_start_to_close_timeout_ms,
            request_id: format!("continue-as-new-{}", spec.new_run_id),
            cron_schedule: spec.cron_schedule.clone(),
            retry_policy: spec.retry_policy.clone(),
            attempt: spec.attempt,
            parent_workflow: None,
            continued_from_run_id: Some(previous_identity.run_id),
            first_decision_task_backoff_seconds: spec.backoff_start_interval_seconds,
        };
        let mut state = MutableState::new_from_start(new_identity.clone(), EventId::FIRST, now_ms, &started_event)?;
        let mut events = vec![HistoryEventRecord::new(EventId::FIRST, now_ms, started_event)];
        let mut timer_tasks: Vec<TimerSpec> = Vec::new();
        let mut transfer_tasks: Vec<TransferSpec> =
            vec![TransferSpec { kind: TransferTaskKind::RecordWorkflowStarted }];

        if spec.backoff_start_interval_seconds > 0 {
            let backoff_ms = spec.backoff_start_interval_seconds as i64 * 1000;
            state.execution_info.workflow_expiration_timestamp_ms =
                state.execution_info.workflow_expiration_timestamp_ms.map(|t| t + backoff_ms);
            timer_tasks.push(timer_builder::workflow_backoff(now_ms + backoff_ms));
        } else {
            let (sched_events, _schedule_id, transfer, timeout_timer, sticky_timer) =
                decision_handler::schedule_decision_task(&mut state, now_ms)?;
            events.extend(sched_events);
            transfer_tasks.push(transfer);
            timer_tasks.push(timeout_timer);
            if let Some(t) = sticky_timer {
                timer_tasks.push(t);
            }
        }
        if let Some(fire) = timer_builder::workflow_timeout(&state) {
            timer_tasks.push(fire);
        }

        let run_id = spec.new_run_id;
        self.create_with_reuse(
            new_identity,
            CreateWorkflowMode::BrandNew,
            events,
            state,
            transfer_tasks,
            timer_tasks,
            &RequestId::new(format!("continue-as-new-{run_id}")),
            WorkflowIdReusePolicy::AllowDuplicate,
            run_id,
        )
        .await
        .map(|_| ())
    }

    /// `GetMutableState` (§4.6): returns the current snapshot immediately
    /// unless the caller's `expected_next_event_id` is already caught up
    /// and the run is still open, in which case it long-polls (bounded by
    /// `long_poll_expiration_interval_ms` and the caller's own `deadline`)
    /// for the next change before reloading and returning.
    pub async fn get_mutable_state(
        &self,
        identity: ExecutionIdentity,
        expected_next_event_id: Option<EventId>,
        deadline: Duration,
    ) -> HistoryResult<GetMutableStateResponse> {
        let snapshot = self.load_snapshot(&identity).await?;
        let should_wait = match expected_next_event_id {
            Some(expected) => snapshot.is_running && expected.0 >= snapshot.next_event_id.0,
            None => false,
        };
        if !should_wait {
            return Ok(snapshot);
        }

        let mut receiver = self.occ.notifier.watch(
            &identity,
            NotifierState { next_event_id: snapshot.next_event_id, is_closed: !snapshot.is_running },
        );
        let wait_deadline = self.config.long_poll_expiration_interval().min(deadline);
        #[allow(clippy::expect_used)]
        let expected = expected_next_event_id.expect("should_wait implies Some");

        let _ = tokio::time::timeout(wait_deadline, async {
            loop {
                if receiver.changed().await.is_err() {
                    return;
                }
                let state = *receiver.borrow();
                if state.is_closed || expected.0 < state.next_event_id.0 {
                    return;
                }
            }
        })
        .await;

        self.load_snapshot(&identity).await
    }

    async fn load_snapshot(&self, identity: &ExecutionIdentity) -> HistoryResult<GetMutableStateResponse> {
        let records = self
            .occ
            .history
            .read_history_branch(identity)
            .await
            .map_err(|e| HistoryError::entity_not_exists(e.to_string()))?;
        let state = MutableState::rebuild_from_history(identity.clone(), &records)?;
        Ok(GetMutableStateResponse {
            next_event_id: state.next_event_id,
            is_running: !state.is_closed(),
            close_status: state.execution_info.close_status,
        })
    }
}

/// Shared by `signal_workflow` and `signal_with_start`'s running branch:
/// dedupe by request ID, enforce the per-execution signal cap, then
/// schedule a follow-up decision task if none is outstanding.
fn signal_mutation(
    state: &mut MutableState,
    config: &ShardConfig,
    signal_name: &str,
    input: &str,
    request_id: &RequestId,
    now_ms: i64,
) -> HistoryResult<MutationOutcome<()>> {
    if state.is_closed() {
        return Err(HistoryError::entity_not_exists("workflow already completed"));
    }
    if state.signals_requested.contains(request_id.as_str()) {
        return Ok(MutationOutcome::new(()));
    }
    if state.execution_info.signal_count >= config.maximum_signals_per_execution as u64 {
        return Err(HistoryError::limit_exceeded("SignalsLimitExceeded"));
    }
    let mut outcome = MutationOutcome::new(());
    let events = state.record_live_event(
        HistoryEvent::WorkflowExecutionSignaled {
            signal_name: signal_name.to_string(),
            input: input.to_string(),
            request_id: request_id.to_string(),
        },
        now_ms,
    )?;
    outcome.new_events = events;
    schedule_follow_up_decision_if_idle(state, now_ms, &mut outcome)?;
    Ok(outcome)
}

/// Schedule a brand-new decision task and fold its events/tasks into
/// `outcome`, but only if none is already outstanding — shared by every
/// operation that appends a live event and may need to wake the decider.
fn schedule_follow_up_decision_if_idle<R>(
    state: &mut MutableState,
    now_ms: i64,
    outcome: &mut MutationOutcome<R>,
) -> HistoryResult<()> {
    if state.pending_decision.is_some() {
        return Ok(());
    }
    let (sched_events, _schedule_id, transfer, timeout_timer, sticky_timer) =
        decision_handler::schedule_decision_task(state, now_ms)?;
    outcome.new_events.extend(sched_events);
    outcome.transfer_tasks.push(transfer);
    outcome.timer_tasks.push(timeout_timer);
    if let Some(t) = sticky_timer {
        outcome.timer_tasks.push(t);
    }
    Ok(())
}

/// §4.7: whether `policy` permits starting a fresh run given what's
/// currently on record for this `WorkflowId`.
fn check_reuse_policy(policy: WorkflowIdReusePolicy, rec: &CurrentExecutionRecord) -> HistoryResult<()> {
    if rec.is_running {
        return Err(HistoryError::already_started("previous run is still running"));
    }
    match policy {
        WorkflowIdReusePolicy::AllowDuplicate => Ok(()),
        WorkflowIdReusePolicy::AllowDuplicateFailedOnly => match rec.close_status {
            Some(CloseStatus::Failed)
            | Some(CloseStatus::Canceled)
            | Some(CloseStatus::Terminated)
            | Some(CloseStatus::TimedOut) => Ok(()),
            _ => Err(HistoryError::already_started("previous run did not fail, cancel, terminate, or time out")),
        },
        WorkflowIdReusePolicy::RejectDuplicate => {
            Err(HistoryError::already_started("workflow id reuse rejected by policy"))
        }
    }
}

fn map_create_error(err: ShardError) -> HistoryError {
    match err {
        ShardError::Internal(msg) => HistoryError::Internal(msg),
        ShardError::TransactionSizeLimit => HistoryError::TransactionSizeLimit,
        ShardError::Conflict { .. } => HistoryError::Internal("unexpected occ conflict on create".to_string()),
        ShardError::AlreadyStarted(_) => HistoryError::Internal("unexpected already-started on create".to_string()),
        ShardError::Timeout => HistoryError::timeout("shard create timed out"),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
