// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ShardContextWrapper` (§4.2 step 9, §9): decorates a concrete
//! [`ShardContext`] so that every successful write also wakes the
//! transfer/timer queue processors with the tasks it just persisted.
//!
//! [`OccRuntime::run_mutation`](crate::occ::OccRuntime::run_mutation) only
//! talks to `Arc<dyn ShardContext>` and only notifies
//! [`HistoryEventNotifier`](crate::notifier::HistoryEventNotifier) on
//! success — it has no idea the queue processors exist. Substituting this
//! wrapper at daemon wiring time closes that gap without touching the OCC
//! loop itself. Grounded on the teacher's `ShardContext` decorator stack
//! (`daemon/src/engine/shard/wrapper.rs`), which layers rate limiting and
//! metrics over a base shard the same way.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use wfh_storage::{
    ClusterMetadata, CreateWorkflowExecutionRequest, ShardContext, ShardError, TimerQueueProcessor,
    TransferQueueProcessor, UpdateWorkflowExecutionRequest,
};

/// Wraps an inner [`ShardContext`], notifying the transfer/timer queue
/// processors after every successful write. Processors are set once, after
/// construction, via [`Self::set_processors`] (the engine and the
/// processors it notifies are constructed from the same shard handle, so a
/// `OnceLock` avoids a circular-construction dependency).
pub struct ShardContextWrapper {
    inner: Arc<dyn ShardContext>,
    cluster: Arc<dyn ClusterMetadata>,
    transfer_processor: OnceLock<Arc<dyn TransferQueueProcessor>>,
    timer_processor: OnceLock<Arc<dyn TimerQueueProcessor>>,
}

impl ShardContextWrapper {
    pub fn new(inner: Arc<dyn ShardContext>, cluster: Arc<dyn ClusterMetadata>) -> Self {
        Self { inner, cluster, transfer_processor: OnceLock::new(), timer_processor: OnceLock::new() }
    }

    /// Attach the processors to notify. Calling this more than once is a
    /// programmer error (the processors are wired once at startup); later
    /// calls are silently ignored rather than panicking, since a daemon
    /// shutdown/restart path may re-run wiring defensively.
    pub fn set_processors(
        &self,
        transfer: Arc<dyn TransferQueueProcessor>,
        timer: Arc<dyn TimerQueueProcessor>,
    ) {
        let _ = self.transfer_processor.set(transfer);
        let _ = self.timer_processor.set(timer);
    }
}

#[async_trait]
impl ShardContext for ShardContextWrapper {
    async fn get_next_transfer_task_id(&self) -> i64 {
        self.inner.get_next_transfer_task_id().await
    }

    async fn create_workflow_execution(
        &self,
        req: CreateWorkflowExecutionRequest,
    ) -> Result<(), ShardError> {
        let transfer_tasks = req.transfer_tasks.clone();
        let timer_tasks = req.timer_tasks.clone();
        self.inner.create_workflow_execution(req).await?;
        self.notify_processors(transfer_tasks, timer_tasks).await;
        Ok(())
    }

    async fn update_workflow_execution(
        &self,
        req: UpdateWorkflowExecutionRequest,
    ) -> Result<(), ShardError> {
        let transfer_tasks = req.transfer_tasks.clone();
        let timer_tasks = req.timer_tasks.clone();
        self.inner.update_workflow_execution(req).await?;
        self.notify_processors(transfer_tasks, timer_tasks).await;
        Ok(())
    }

    async fn get_current_time(&self, cluster: &str) -> i64 {
        self.inner.get_current_time(cluster).await
    }

    async fn set_current_time(&self, cluster: &str, timestamp_ms: i64) {
        self.inner.set_current_time(cluster, timestamp_ms).await;
    }

    async fn update_domain_notification_version(&self, version: i64) {
        self.inner.update_domain_notification_version(version).await;
    }

    async fn get_domain_notification_version(&self) -> i64 {
        self.inner.get_domain_notification_version().await
    }
}

impl ShardContextWrapper {
    async fn notify_processors(
        &self,
        transfer_tasks: Vec<wfh_storage::TransferTask>,
        timer_tasks: Vec<wfh_storage::TimerTask>,
    ) {
        let cluster_name = self.cluster.get_current_cluster_name();
        if !transfer_tasks.is_empty() {
            if let Some(processor) = self.transfer_processor.get() {
                processor.notify_new_task(cluster_name, transfer_tasks).await;
            }
        }
        if !timer_tasks.is_empty() {
            if let Some(processor) = self.timer_processor.get() {
                let reference_time_ms = self.inner.get_current_time(cluster_name).await;
                processor.notify_new_timers(cluster_name, reference_time_ms, timer_tasks).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "shard_wrapper_tests.rs"]
mod tests;
