// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The OCC update loop (§4.2): load → mutate → persist → retry-on-conflict,
//! bounded by `conditional_retry_count`.

use std::sync::Arc;
use std::time::Duration;
use wfh_core::{ExecutionIdentity, HistoryError, HistoryEventRecord, HistoryResult, MutableState};
use wfh_storage::{
    HistoryManager, ShardContext, ShardError, TransferTaskKind, UpdateWorkflowExecutionRequest,
};

use crate::execution_cache::ExecutionCache;
use crate::metrics::EngineMetrics;
use crate::notifier::{HistoryEventNotifier, NotifierState};
use crate::timer_builder::{self, TimerSpec};

/// A transfer task not yet assigned a durable `task_id`, mirroring
/// [`timer_builder::TimerSpec`]. Kept id-less so callers (decision handler,
/// start-workflow path) can build it without shard access; [`OccRuntime`]
/// stamps the id right before persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    pub kind: TransferTaskKind,
}

impl TransferSpec {
    pub fn into_task(self, task_id: i64, identity: &ExecutionIdentity) -> wfh_storage::TransferTask {
        wfh_storage::TransferTask {
            task_id,
            domain_id: identity.domain_id.clone(),
            workflow_id: identity.workflow_id.clone(),
            run_id: identity.run_id.clone(),
            kind: self.kind,
        }
    }
}

/// What a mutation closure appended/generated, besides whatever custom
/// `result` it wants to hand back to its caller. Tasks are carried as
/// id-less specs; [`OccRuntime::run_mutation`] reserves a durable task ID
/// for each right before persist (§4.2 step 4).
pub struct MutationOutcome<R> {
    pub new_events: Vec<HistoryEventRecord>,
    pub transfer_tasks: Vec<TransferSpec>,
    pub timer_tasks: Vec<TimerSpec>,
    pub result: R,
}

impl<R> MutationOutcome<R> {
    pub fn new(result: R) -> Self {
        Self { new_events: Vec::new(), transfer_tasks: Vec::new(), timer_tasks: Vec::new(), result }
    }
}

/// Retention window applied to a closed run's `RetentionDelete` timer.
/// Not a configured knob in §6; fixed here the way the rest of the close
/// path's constants are.
pub const DEFAULT_RETENTION_MS: i64 = 3 * 24 * 60 * 60 * 1000;

fn map_shard_error(err: ShardError) -> HistoryError {
    match err {
        ShardError::Conflict { .. } => HistoryError::Conflict,
        ShardError::AlreadyStarted(rec) => {
            HistoryError::already_started(format!("run {} is already current", rec.run_id))
        }
        ShardError::Timeout => HistoryError::timeout("shard write timed out"),
        ShardError::TransactionSizeLimit => HistoryError::TransactionSizeLimit,
        ShardError::Internal(msg) => HistoryError::Internal(msg),
    }
}

/// Shared collaborators the OCC loop needs on every call. Cheap to clone
/// (everything behind an `Arc`); the engine façade holds one of these and
/// hands out clones to whichever operation is running.
#[derive(Clone)]
pub struct OccRuntime {
    pub shard: Arc<dyn ShardContext>,
    pub history: Arc<dyn HistoryManager>,
    pub cache: Arc<ExecutionCache>,
    pub notifier: Arc<HistoryEventNotifier>,
    pub metrics: Arc<EngineMetrics>,
    pub conditional_retry_count: u32,
    pub lease_timeout: Duration,
}

impl OccRuntime {
    /// Load (from cache or persistence) into the lease's slot if not
    /// already present, returning a reference to the live state.
    async fn ensure_loaded<'a>(
        &self,
        identity: &ExecutionIdentity,
        lease: &'a mut crate::execution_cache::ExecutionLease,
    ) -> HistoryResult<()> {
        if lease.get().is_some() {
            return Ok(());
        }
        let records = self
            .history
            .read_history_branch(identity)
            .await
            .map_err(|e| HistoryError::entity_not_exists(e.to_string()))?;
        let state = MutableState::rebuild_from_history(identity.clone(), &records)?;
        lease.set(state);
        Ok(())
    }

    /// Run one OCC-protected mutation to completion, retrying on conflict
    /// up to `conditional_retry_count` times (§4.2).
    pub async fn run_mutation<R, F>(&self, identity: &ExecutionIdentity, mut mutate: F) -> HistoryResult<R>
    where
        F: FnMut(&mut MutableState) -> HistoryResult<MutationOutcome<R>>,
    {
        for _attempt in 0..self.conditional_retry_count {
            let mut lease = self.cache.acquire(identity, self.lease_timeout).await?;
            self.ensure_loaded(identity, &mut lease).await?;

            // `ExecutionLease::get` only exposes a shared reference, so
            // mutation runs against a scratch copy that replaces the
            // lease's slot once persist succeeds.
            #[allow(clippy::expect_used)]
            let mut scratch = lease.get().expect("just loaded").clone();
            let condition = scratch.condition();
            let outcome = match mutate(&mut scratch) {
                Ok(outcome) => outcome,
                Err(err) if err.is_local_retry() => {
                    self.metrics.record_occ_conflict();
                    lease.clear();
                    continue;
                }
                Err(err) => return Err(err),
            };
            let MutationOutcome { new_events, transfer_tasks: transfer_specs, timer_tasks: timer_specs, result } =
                outcome;

            let mut transfer_tasks = Vec::with_capacity(transfer_specs.len());
            for spec in transfer_specs {
                let task_id = self.shard.get_next_transfer_task_id().await;
                transfer_tasks.push(spec.into_task(task_id, identity));
            }
            let mut timer_tasks = Vec::with_capacity(timer_specs.len());
            for spec in timer_specs {
                let task_id = self.shard.get_next_transfer_task_id().await;
                timer_tasks.push(spec.into_task(task_id, identity));
            }

            let persist_result = self
                .shard
                .update_workflow_execution(UpdateWorkflowExecutionRequest {
                    identity: identity.clone(),
                    condition,
                    new_events,
                    mutable_state: scratch.clone(),
                    transfer_tasks,
                    timer_tasks,
                })
                .await;

            match persist_result {
                Ok(()) => {
                    let notifier_state =
                        NotifierState { next_event_id: scratch.next_event_id, is_closed: scratch.is_closed() };
                    lease.set(scratch);
                    self.notifier.notify(identity, notifier_state);
                    return Ok(result);
                }
                Err(ShardError::Conflict { .. }) => {
                    self.metrics.record_occ_conflict();
                    lease.clear();
                    continue;
                }
                Err(ShardError::TransactionSizeLimit) => {
                    lease.clear();
                    return Err(self
                        .terminate_for_transaction_size(identity)
                        .await
                        .unwrap_or(HistoryError::TransactionSizeLimit));
                }
                Err(other) => {
                    lease.clear();
                    return Err(map_shard_error(other));
                }
            }
        }
        self.metrics.record_occ_retries_exhausted();
        Err(HistoryError::MaxAttemptsExceeded)
    }

    /// §4.2 step 7: on a transaction-size-limit error, reload, terminate
    /// the run, emit close-cleanup tasks, and persist that termination
    /// before surfacing the original error.
    async fn terminate_for_transaction_size(&self, identity: &ExecutionIdentity) -> HistoryResult<HistoryError> {
        let records = self
            .history
            .read_history_branch(identity)
            .await
            .map_err(|e| HistoryError::entity_not_exists(e.to_string()))?;
        let mut state = MutableState::rebuild_from_history(identity.clone(), &records)?;
        if state.is_closed() {
            return Ok(HistoryError::TransactionSizeLimit);
        }
        let condition = state.condition();
        let now_ms = self.shard.get_current_time("").await;
        let event = wfh_core::HistoryEvent::WorkflowExecutionTerminated {
            reason: "TransactionSizeExceedsLimit".to_string(),
            details: String::new(),
        };
        let new_events = state.record_live_event(event, now_ms)?;
        let (close_kind, retention_spec) = timer_builder::close_cleanup_tasks(now_ms, DEFAULT_RETENTION_MS);
        let transfer_task_id = self.shard.get_next_transfer_task_id().await;
        let transfer_tasks = vec![TransferSpec { kind: close_kind }.into_task(transfer_task_id, identity)];
        let timer_task_id = self.shard.get_next_transfer_task_id().await;
        let timer_tasks = vec![retention_spec.into_task(timer_task_id, identity)];

        self.shard
            .update_workflow_execution(UpdateWorkflowExecutionRequest {
                identity: identity.clone(),
                condition,
                new_events,
                mutable_state: state,
                transfer_tasks,
                timer_tasks,
            })
            .await
            .map_err(map_shard_error)?;
        Ok(HistoryError::TransactionSizeLimit)
    }
}

#[cfg(test)]
#[path = "occ_tests.rs"]
mod tests;
