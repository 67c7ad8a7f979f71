// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! §6 collaborator interfaces, as `async-trait` traits.
//!
//! The engine crate depends only on these traits, never on a concrete
//! persistence/replication/RPC implementation. The `test-support` feature
//! (see [`crate::test_support`]) supplies an in-memory implementation of
//! each, sufficient to exercise the engine end to end; a production binary
//! would supply its own implementations backed by a real database and wire
//! protocol without touching the engine crate at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use wfh_core::{CloseStatus, DomainId, EventId, ExecutionIdentity, HistoryEventRecord, MutableState, RunId, WorkflowId};

use crate::domain::Domain;
use crate::tasks::{TimerTask, TransferTask};

/// Errors a [`ShardContext`] write can fail with.
#[derive(Debug, Error)]
pub enum ShardError {
    /// The caller's loaded condition no longer matches the stored
    /// `next_event_id`; the OCC loop must reload and retry.
    #[error("condition mismatch: expected {expected}, found {found}")]
    Conflict { expected: EventId, found: EventId },

    /// `CreateWorkflowExecution` raced an existing run for the same
    /// `WorkflowId`. Carries what's currently on record so the caller can
    /// apply the reuse policy (§4.7) or recognize its own duplicate.
    #[error("workflow execution already started")]
    AlreadyStarted(Box<CurrentExecutionRecord>),

    /// The write did not complete before the deadline. Per §4.4/§7, a
    /// timeout on `CreateWorkflowExecution` is treated as success for
    /// idempotency purposes at the call site.
    #[error("persistence timeout")]
    Timeout,

    /// The write would exceed the configured transaction size limit.
    #[error("transaction size limit exceeded")]
    TransactionSizeLimit,

    #[error("internal storage error: {0}")]
    Internal(String),
}

/// How `CreateWorkflowExecution` should treat a conflicting current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateWorkflowMode {
    /// No current record for this `WorkflowId` is expected to exist.
    BrandNew,
    /// A current record exists and the reuse policy has approved replacing
    /// it; carries the run ID expected to still be current.
    WorkflowIdReuse { previous_run_id: RunId },
}

/// What's on record for a `WorkflowId`'s most recent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentExecutionRecord {
    pub run_id: RunId,
    pub is_running: bool,
    pub close_status: Option<CloseStatus>,
    pub start_request_id: String,
    pub last_write_version: i64,
}

/// A fully-formed create request: first event plus the initial mutable
/// state and any tasks generated alongside it (§4.4).
#[derive(Debug, Clone)]
pub struct CreateWorkflowExecutionRequest {
    pub mode: CreateWorkflowMode,
    pub identity: ExecutionIdentity,
    pub events: Vec<HistoryEventRecord>,
    pub mutable_state: MutableState,
    pub transfer_tasks: Vec<TransferTask>,
    pub timer_tasks: Vec<TimerTask>,
}

/// An OCC-conditional update: new events plus the post-mutation state and
/// the tasks generated by this mutation (§4.2).
#[derive(Debug, Clone)]
pub struct UpdateWorkflowExecutionRequest {
    pub identity: ExecutionIdentity,
    pub condition: EventId,
    pub new_events: Vec<HistoryEventRecord>,
    pub mutable_state: MutableState,
    pub transfer_tasks: Vec<TransferTask>,
    pub timer_tasks: Vec<TimerTask>,
}

/// `ShardContext`: the atomic write surface over history + execution +
/// tasks, plus the shard-local clock and domain-notification bookkeeping
/// (§6).
#[async_trait]
pub trait ShardContext: Send + Sync {
    async fn get_next_transfer_task_id(&self) -> i64;

    async fn create_workflow_execution(
        &self,
        req: CreateWorkflowExecutionRequest,
    ) -> Result<(), ShardError>;

    async fn update_workflow_execution(
        &self,
        req: UpdateWorkflowExecutionRequest,
    ) -> Result<(), ShardError>;

    async fn get_current_time(&self, cluster: &str) -> i64;

    async fn set_current_time(&self, cluster: &str, timestamp_ms: i64);

    async fn update_domain_notification_version(&self, version: i64);

    async fn get_domain_notification_version(&self) -> i64;
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("history branch not found for {0}")]
    NotFound(ExecutionIdentity),
    #[error("internal history store error: {0}")]
    Internal(String),
}

/// `HistoryManager` / `HistoryV2Manager`: append-only event storage,
/// selected per domain by the `enable_events_v2` config knob (§6). The two
/// teacher-named managers collapse to one trait here since the wire format
/// distinction is a persistence-layer concern out of this engine's scope.
#[async_trait]
pub trait HistoryManager: Send + Sync {
    async fn append_history_events(
        &self,
        identity: &ExecutionIdentity,
        events: &[HistoryEventRecord],
    ) -> Result<(), PersistError>;

    async fn read_history_branch(
        &self,
        identity: &ExecutionIdentity,
    ) -> Result<Vec<HistoryEventRecord>, PersistError>;

    async fn delete_history_branch(&self, identity: &ExecutionIdentity) -> Result<(), PersistError>;
}

/// `ExecutionManager`: the "current run" pointer per `WorkflowId`, used to
/// resolve the workflow-ID reuse policy (§4.7) independent of whatever
/// mutable state happens to be cached.
#[async_trait]
pub trait ExecutionManager: Send + Sync {
    async fn get_current_execution(
        &self,
        domain_id: &DomainId,
        workflow_id: &WorkflowId,
    ) -> Option<CurrentExecutionRecord>;
}

/// `VisibilityManager`: the searchable execution index, updated on close.
#[async_trait]
pub trait VisibilityManager: Send + Sync {
    async fn delete_workflow_execution(&self, identity: &ExecutionIdentity);
}

/// A domain-cache change notification: the domains whose metadata changed,
/// in the update that triggered the callback.
pub type DomainChangeCallback = Arc<dyn Fn(&[Domain]) + Send + Sync>;

/// `DomainCache`: read-mostly, copy-on-write domain metadata (§5).
#[async_trait]
pub trait DomainCache: Send + Sync {
    async fn get_domain_by_id(&self, domain_id: &DomainId) -> Option<Domain>;

    async fn get_domain(&self, name: &str) -> Option<Domain>;

    /// Register a callback invoked synchronously whenever the domain cache
    /// refreshes. The engine's failover coordinator (§4.8) is the only
    /// consumer.
    fn register_domain_change_callback(&self, callback: DomainChangeCallback);
}

/// `ClusterMetadata`: static-ish cluster topology lookups.
pub trait ClusterMetadata: Send + Sync {
    fn get_current_cluster_name(&self) -> &str;

    fn is_global_domain_enabled(&self) -> bool;

    fn cluster_name_for_failover_version(&self, failover_version: i64) -> Option<String>;
}

/// `TransferQueueProcessor` / `TimerQueueProcessor` share the same shape
/// (§4.8, §6): start/stop, a processing lock the failover callback takes
/// exclusively, a failover hook, and a best-effort notify.
#[async_trait]
pub trait TransferQueueProcessor: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
    async fn lock_task_processing(&self);
    async fn unlock_task_processing(&self);
    async fn failover_domain(&self, domain_ids: &[DomainId]);
    async fn notify_new_task(&self, cluster: &str, tasks: Vec<TransferTask>);
}

#[async_trait]
pub trait TimerQueueProcessor: Send + Sync {
    async fn start(&self);
    async fn stop(&self);
    async fn lock_task_processing(&self);
    async fn unlock_task_processing(&self);
    async fn failover_domain(&self, domain_ids: &[DomainId]);
    async fn notify_new_timers(&self, cluster: &str, reference_time_ms: i64, tasks: Vec<TimerTask>);
}

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("replication error: {0}")]
    Internal(String),
}

/// Activity state synchronized to peer clusters outside the normal event
/// stream (heartbeat details, attempt count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySyncInfo {
    pub schedule_id: EventId,
    pub attempt: u32,
    pub last_heartbeat_timestamp_ms: Option<i64>,
    pub details: Option<String>,
}

/// `Replicator`: passthroughs to the cross-cluster replication pipeline.
/// No conflict-resolution algorithm is specified here (§1 Non-goals); the
/// engine only needs the hook points.
#[async_trait]
pub trait Replicator: Send + Sync {
    async fn apply_events(
        &self,
        identity: &ExecutionIdentity,
        events: &[HistoryEventRecord],
    ) -> Result<(), ReplicationError>;

    async fn apply_raw_events(
        &self,
        identity: &ExecutionIdentity,
        raw: Vec<u8>,
    ) -> Result<(), ReplicationError>;

    async fn sync_activity(
        &self,
        identity: &ExecutionIdentity,
        info: ActivitySyncInfo,
    ) -> Result<(), ReplicationError>;
}

/// `ReplicatorProcessor`: notifies the replication pipeline's own drain
/// loop, mirroring the transfer/timer processors' `notify_new_task`.
#[async_trait]
pub trait ReplicatorProcessor: Send + Sync {
    async fn notify_new_task(&self, cluster: &str);
}

/// Opaque downstreams (§6): named interfaces the engine can call through,
/// with no behavior specified beyond "some other service handles this."
#[async_trait]
pub trait ArchivalClient: Send + Sync {
    async fn archive(&self, identity: &ExecutionIdentity) -> Result<(), String>;
}

#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn add_decision_task(&self, identity: &ExecutionIdentity, task_list: &str, schedule_id: EventId);
    async fn add_activity_task(&self, identity: &ExecutionIdentity, task_list: &str, schedule_id: EventId);
}

#[async_trait]
pub trait HistoryClient: Send + Sync {
    async fn forward_to_cluster(&self, cluster: &str, identity: &ExecutionIdentity) -> Result<(), String>;
}

#[async_trait]
pub trait PublicClient: Send + Sync {
    async fn describe_domain(&self, name: &str) -> Option<Domain>;
}
