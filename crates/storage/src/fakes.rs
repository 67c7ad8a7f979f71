// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory implementations of every `test-support`-gated port, enough to
//! drive the engine end to end without a real database or wire protocol.
//!
//! These mirror the shape of the teacher's own fake collaborators (notably
//! its in-memory queue and workspace registry): plain `indexmap`/`HashMap`
//! state behind a `parking_lot::Mutex`, no actual I/O.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wfh_core::{Clock, DomainId, EventId, ExecutionIdentity, HistoryEventRecord, RunId, SystemClock, WorkflowId};

use crate::domain::Domain;
use crate::ports::{
    ActivitySyncInfo, ArchivalClient, ClusterMetadata, CreateWorkflowExecutionRequest, CreateWorkflowMode,
    CurrentExecutionRecord, DomainCache, DomainChangeCallback, ExecutionManager, HistoryClient, HistoryManager,
    MatchingClient, PersistError, PublicClient, Replicator, ReplicationError, ReplicatorProcessor, ShardContext,
    ShardError, TimerQueueProcessor, TransferQueueProcessor, UpdateWorkflowExecutionRequest, VisibilityManager,
};
use crate::tasks::{TimerTask, TransferTask};

/// Everything a single shard's `create`/`update` calls touch, all under one
/// lock so both operations stay atomic the way a real transactional store
/// would guarantee.
struct ShardState {
    history: HashMap<ExecutionIdentity, Vec<HistoryEventRecord>>,
    current: HashMap<(DomainId, WorkflowId), CurrentExecutionRecord>,
    transfer_tasks: Vec<TransferTask>,
    timer_tasks: Vec<TimerTask>,
    next_transfer_task_id: i64,
    cluster_time_ms: HashMap<String, i64>,
    domain_notification_version: i64,
}

/// In-memory `ShardContext`. Also implements `HistoryManager` and
/// `ExecutionManager` directly, since in this fake they share the same
/// backing map rather than being genuinely separate stores.
pub struct InMemoryShard<C: Clock = SystemClock> {
    clock: C,
    state: Mutex<ShardState>,
}

impl<C: Clock> InMemoryShard<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(ShardState {
                history: HashMap::new(),
                current: HashMap::new(),
                transfer_tasks: Vec::new(),
                timer_tasks: Vec::new(),
                next_transfer_task_id: 1,
                cluster_time_ms: HashMap::new(),
                domain_notification_version: 0,
            }),
        }
    }
}

#[async_trait]
impl<C: Clock + 'static> ShardContext for InMemoryShard<C> {
    async fn get_next_transfer_task_id(&self) -> i64 {
        let mut state = self.state.lock();
        let id = state.next_transfer_task_id;
        state.next_transfer_task_id += 1;
        id
    }

    async fn create_workflow_execution(&self, req: CreateWorkflowExecutionRequest) -> Result<(), ShardError> {
        let mut state = self.state.lock();
        let key = (req.identity.domain_id.clone(), req.identity.workflow_id.clone());

        if let Some(existing) = state.current.get(&key) {
            match &req.mode {
                CreateWorkflowMode::BrandNew => {
                    return Err(ShardError::AlreadyStarted(Box::new(existing.clone())));
                }
                CreateWorkflowMode::WorkflowIdReuse { previous_run_id } => {
                    if &existing.run_id != previous_run_id {
                        return Err(ShardError::AlreadyStarted(Box::new(existing.clone())));
                    }
                }
            }
        }

        state.history.insert(req.identity.clone(), req.events);
        state.current.insert(
            key,
            CurrentExecutionRecord {
                run_id: req.identity.run_id.clone(),
                is_running: true,
                close_status: None,
                start_request_id: req.mutable_state.execution_info.start_request_id.clone(),
                last_write_version: 0,
            },
        );
        state.transfer_tasks.extend(req.transfer_tasks);
        state.timer_tasks.extend(req.timer_tasks);
        Ok(())
    }

    async fn update_workflow_execution(&self, req: UpdateWorkflowExecutionRequest) -> Result<(), ShardError> {
        let mut state = self.state.lock();
        let events = state
            .history
            .get(&req.identity)
            .ok_or_else(|| ShardError::Internal(format!("no history branch for {}", req.identity)))?;
        let stored_next = events
            .last()
            .map(|e| e.event_id.next())
            .unwrap_or(EventId::FIRST);
        if stored_next != req.condition {
            return Err(ShardError::Conflict {
                expected: req.condition,
                found: stored_next,
            });
        }

        let key = (req.identity.domain_id.clone(), req.identity.workflow_id.clone());
        #[allow(clippy::expect_used)]
        state
            .history
            .get_mut(&req.identity)
            .expect("checked above")
            .extend(req.new_events);
        if let Some(current) = state.current.get_mut(&key) {
            current.is_running = req.mutable_state.execution_info.state == wfh_core::ExecutionState::Running;
            current.close_status = req.mutable_state.execution_info.close_status;
        }
        state.transfer_tasks.extend(req.transfer_tasks);
        state.timer_tasks.extend(req.timer_tasks);
        Ok(())
    }

    async fn get_current_time(&self, cluster: &str) -> i64 {
        let state = self.state.lock();
        state
            .cluster_time_ms
            .get(cluster)
            .copied()
            .unwrap_or_else(|| self.clock.epoch_ms() as i64)
    }

    async fn set_current_time(&self, cluster: &str, timestamp_ms: i64) {
        self.state.lock().cluster_time_ms.insert(cluster.to_string(), timestamp_ms);
    }

    async fn update_domain_notification_version(&self, version: i64) {
        self.state.lock().domain_notification_version = version;
    }

    async fn get_domain_notification_version(&self) -> i64 {
        self.state.lock().domain_notification_version
    }
}

#[async_trait]
impl<C: Clock + 'static> HistoryManager for InMemoryShard<C> {
    async fn append_history_events(
        &self,
        identity: &ExecutionIdentity,
        events: &[HistoryEventRecord],
    ) -> Result<(), PersistError> {
        self.state
            .lock()
            .history
            .entry(identity.clone())
            .or_default()
            .extend(events.iter().cloned());
        Ok(())
    }

    async fn read_history_branch(&self, identity: &ExecutionIdentity) -> Result<Vec<HistoryEventRecord>, PersistError> {
        self.state
            .lock()
            .history
            .get(identity)
            .cloned()
            .ok_or_else(|| PersistError::NotFound(identity.clone()))
    }

    async fn delete_history_branch(&self, identity: &ExecutionIdentity) -> Result<(), PersistError> {
        self.state.lock().history.remove(identity);
        Ok(())
    }
}

#[async_trait]
impl<C: Clock + 'static> ExecutionManager for InMemoryShard<C> {
    async fn get_current_execution(
        &self,
        domain_id: &DomainId,
        workflow_id: &WorkflowId,
    ) -> Option<CurrentExecutionRecord> {
        self.state
            .lock()
            .current
            .get(&(domain_id.clone(), workflow_id.clone()))
            .cloned()
    }
}

/// In-memory `VisibilityManager`: just tracks which identities are still
/// considered visible.
#[derive(Default)]
pub struct InMemoryVisibility {
    deleted: Mutex<Vec<ExecutionIdentity>>,
}

impl InMemoryVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deleted(&self) -> Vec<ExecutionIdentity> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl VisibilityManager for InMemoryVisibility {
    async fn delete_workflow_execution(&self, identity: &ExecutionIdentity) {
        self.deleted.lock().push(identity.clone());
    }
}

/// In-memory `DomainCache`, keyed by domain ID with a secondary name index.
pub struct InMemoryDomainCache {
    domains: Mutex<IndexMap<DomainId, Domain>>,
    callbacks: Mutex<Vec<DomainChangeCallback>>,
}

impl InMemoryDomainCache {
    pub fn new() -> Self {
        Self {
            domains: Mutex::new(IndexMap::new()),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Insert or replace a domain and fire every registered callback, as a
    /// real domain cache would after refreshing from its backing store.
    pub fn upsert(&self, domain: Domain) {
        self.domains.lock().insert(domain.domain_id.clone(), domain.clone());
        let callbacks = self.callbacks.lock();
        for cb in callbacks.iter() {
            cb(std::slice::from_ref(&domain));
        }
    }
}

impl Default for InMemoryDomainCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainCache for InMemoryDomainCache {
    async fn get_domain_by_id(&self, domain_id: &DomainId) -> Option<Domain> {
        self.domains.lock().get(domain_id).cloned()
    }

    async fn get_domain(&self, name: &str) -> Option<Domain> {
        self.domains.lock().values().find(|d| d.name == name).cloned()
    }

    fn register_domain_change_callback(&self, callback: DomainChangeCallback) {
        self.callbacks.lock().push(callback);
    }
}

/// In-memory `ClusterMetadata`: a single fixed cluster name plus an
/// optional set of peers, enough to test the multi-cluster failover path
/// without a real ring.
pub struct FixedClusterMetadata {
    current_cluster: String,
    global_domains_enabled: bool,
    versions: HashMap<i64, String>,
}

impl FixedClusterMetadata {
    pub fn new(current_cluster: impl Into<String>) -> Self {
        Self {
            current_cluster: current_cluster.into(),
            global_domains_enabled: false,
            versions: HashMap::new(),
        }
    }

    pub fn with_global_domains(mut self, enabled: bool) -> Self {
        self.global_domains_enabled = enabled;
        self
    }

    pub fn with_cluster_for_version(mut self, version: i64, cluster: impl Into<String>) -> Self {
        self.versions.insert(version, cluster.into());
        self
    }
}

impl ClusterMetadata for FixedClusterMetadata {
    fn get_current_cluster_name(&self) -> &str {
        &self.current_cluster
    }

    fn is_global_domain_enabled(&self) -> bool {
        self.global_domains_enabled
    }

    fn cluster_name_for_failover_version(&self, failover_version: i64) -> Option<String> {
        self.versions.get(&failover_version).cloned()
    }
}

/// In-memory queue processor shared shape for both transfer and timer
/// queues: records what it was told, with a lock flag the failover path
/// can assert against in tests.
#[derive(Default)]
struct QueueProcessorState {
    started: bool,
    locked: bool,
    failovers: Vec<Vec<DomainId>>,
}

#[derive(Default)]
pub struct InMemoryTransferQueueProcessor {
    state: Mutex<QueueProcessorState>,
    received: Mutex<Vec<TransferTask>>,
}

impl InMemoryTransferQueueProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<TransferTask> {
        self.received.lock().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }
}

#[async_trait]
impl TransferQueueProcessor for InMemoryTransferQueueProcessor {
    async fn start(&self) {
        self.state.lock().started = true;
    }

    async fn stop(&self) {
        self.state.lock().started = false;
    }

    async fn lock_task_processing(&self) {
        self.state.lock().locked = true;
    }

    async fn unlock_task_processing(&self) {
        self.state.lock().locked = false;
    }

    async fn failover_domain(&self, domain_ids: &[DomainId]) {
        self.state.lock().failovers.push(domain_ids.to_vec());
    }

    async fn notify_new_task(&self, _cluster: &str, tasks: Vec<TransferTask>) {
        self.received.lock().extend(tasks);
    }
}

#[derive(Default)]
pub struct InMemoryTimerQueueProcessor {
    state: Mutex<QueueProcessorState>,
    received: Mutex<Vec<TimerTask>>,
}

impl InMemoryTimerQueueProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<TimerTask> {
        let mut tasks = self.received.lock().clone();
        tasks.sort_by_key(|t| t.sort_key());
        tasks
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }
}

#[async_trait]
impl TimerQueueProcessor for InMemoryTimerQueueProcessor {
    async fn start(&self) {
        self.state.lock().started = true;
    }

    async fn stop(&self) {
        self.state.lock().started = false;
    }

    async fn lock_task_processing(&self) {
        self.state.lock().locked = true;
    }

    async fn unlock_task_processing(&self) {
        self.state.lock().locked = false;
    }

    async fn failover_domain(&self, domain_ids: &[DomainId]) {
        self.state.lock().failovers.push(domain_ids.to_vec());
    }

    async fn notify_new_timers(&self, _cluster: &str, _reference_time_ms: i64, tasks: Vec<TimerTask>) {
        self.received.lock().extend(tasks);
    }
}

/// No-op fakes for the collaborators whose behavior this engine never
/// inspects, kept around only so the full port surface can be wired end to
/// end in a daemon binary or test harness.
#[derive(Default)]
pub struct NoopReplicator;

#[async_trait]
impl Replicator for NoopReplicator {
    async fn apply_events(&self, _identity: &ExecutionIdentity, _events: &[HistoryEventRecord]) -> Result<(), ReplicationError> {
        Ok(())
    }

    async fn apply_raw_events(&self, _identity: &ExecutionIdentity, _raw: Vec<u8>) -> Result<(), ReplicationError> {
        Ok(())
    }

    async fn sync_activity(&self, _identity: &ExecutionIdentity, _info: ActivitySyncInfo) -> Result<(), ReplicationError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopReplicatorProcessor;

#[async_trait]
impl ReplicatorProcessor for NoopReplicatorProcessor {
    async fn notify_new_task(&self, _cluster: &str) {}
}

#[derive(Default)]
pub struct NoopArchivalClient;

#[async_trait]
impl ArchivalClient for NoopArchivalClient {
    async fn archive(&self, _identity: &ExecutionIdentity) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopMatchingClient {
    decision_tasks: Mutex<Vec<(ExecutionIdentity, String, EventId)>>,
    activity_tasks: Mutex<Vec<(ExecutionIdentity, String, EventId)>>,
}

impl NoopMatchingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision_tasks(&self) -> Vec<(ExecutionIdentity, String, EventId)> {
        self.decision_tasks.lock().clone()
    }

    pub fn activity_tasks(&self) -> Vec<(ExecutionIdentity, String, EventId)> {
        self.activity_tasks.lock().clone()
    }
}

#[async_trait]
impl MatchingClient for NoopMatchingClient {
    async fn add_decision_task(&self, identity: &ExecutionIdentity, task_list: &str, schedule_id: EventId) {
        self.decision_tasks.lock().push((identity.clone(), task_list.to_string(), schedule_id));
    }

    async fn add_activity_task(&self, identity: &ExecutionIdentity, task_list: &str, schedule_id: EventId) {
        self.activity_tasks.lock().push((identity.clone(), task_list.to_string(), schedule_id));
    }
}

#[derive(Default)]
pub struct NoopHistoryClient;

#[async_trait]
impl HistoryClient for NoopHistoryClient {
    async fn forward_to_cluster(&self, _cluster: &str, _identity: &ExecutionIdentity) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopPublicClient;

#[async_trait]
impl PublicClient for NoopPublicClient {
    async fn describe_domain(&self, _name: &str) -> Option<Domain> {
        None
    }
}

#[cfg(test)]
#[path = "fakes_tests.rs"]
mod tests;
