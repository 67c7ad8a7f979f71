// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain-failover coordination (§4.8): when a global domain's active
//! cluster changes to this shard's cluster, queue processing must pause,
//! pick up the new domain version, and resume so in-flight tasks aren't
//! processed against a stale failover version.
//!
//! [`DomainCache::register_domain_change_callback`] only accepts a
//! synchronous callback, but locking/unlocking the queue processors and
//! writing the shard's notification version are all async. Grounded on the
//! teacher's notify-then-drain pattern for its own synchronous watch
//! callbacks (`daemon/src/config/watch.rs`): the callback does nothing but
//! push onto an unbounded channel, and a spawned task owns the actual
//! async work.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use wfh_core::DomainId;
use wfh_storage::{ClusterMetadata, Domain, DomainCache, ShardContext, TimerQueueProcessor, TransferQueueProcessor};

use crate::occ::TransferSpec;
use crate::timer_builder::TimerSpec;

/// Coordinates a shard's response to domain-cache changes that imply a
/// failover: pausing both queue processors, handing them the list of
/// newly-active domains, nudging them to re-scan, and bumping the shard's
/// own notification version so the same change isn't reprocessed.
pub struct FailoverCoordinator {
    shard: Arc<dyn ShardContext>,
    transfer_processor: Arc<dyn TransferQueueProcessor>,
    timer_processor: Arc<dyn TimerQueueProcessor>,
    cluster: Arc<dyn ClusterMetadata>,
}

impl FailoverCoordinator {
    pub fn new(
        shard: Arc<dyn ShardContext>,
        transfer_processor: Arc<dyn TransferQueueProcessor>,
        timer_processor: Arc<dyn TimerQueueProcessor>,
        cluster: Arc<dyn ClusterMetadata>,
    ) -> Arc<Self> {
        Arc::new(Self { shard, transfer_processor, timer_processor, cluster })
    }

    /// Register this coordinator against `domain_cache`'s synchronous
    /// change callback, bridging to the async [`Self::handle_change`] via
    /// a spawned drain loop. The returned join handle is for tests; a
    /// daemon just lets it run for the process lifetime.
    pub fn register(self: &Arc<Self>, domain_cache: &Arc<dyn DomainCache>) -> tokio::task::JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Domain>>();
        domain_cache.register_domain_change_callback(Arc::new(move |domains: &[Domain]| {
            let _ = tx.send(domains.to_vec());
        }));

        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(domains) = rx.recv().await {
                coordinator.handle_change(&domains).await;
            }
        })
    }

    /// Whether `domain` represents a failover this shard hasn't yet
    /// observed: a global domain whose active cluster is now this shard's
    /// cluster, with a notification version newer than the shard's own.
    fn is_unobserved_failover(&self, domain: &Domain, shard_notification_version: i64) -> bool {
        domain.replication.is_global_domain
            && domain.is_active_in(self.cluster.get_current_cluster_name())
            && domain.failover_notification_version >= shard_notification_version
    }

    /// §4.8: lock both processors, apply the failover to each, nudge them
    /// to re-scan, bump the shard's notification version past every domain
    /// change just observed, then unlock.
    pub async fn handle_change(&self, domains: &[Domain]) {
        if domains.is_empty() {
            return;
        }
        let shard_version = self.shard.get_domain_notification_version().await;
        let failing_over: Vec<DomainId> = domains
            .iter()
            .filter(|d| self.is_unobserved_failover(d, shard_version))
            .map(|d| d.domain_id.clone())
            .collect();

        // §4.8 step 4: the shard's notification version is set one past the
        // highest `failover_notification_version` observed, not to that
        // value itself — otherwise the next identical update still compares
        // `>=` true in `is_unobserved_failover` and re-triggers the same
        // failover cycle.
        let next_version = domains.iter().map(|d| d.failover_notification_version).max().map(|v| v + 1);

        if failing_over.is_empty() {
            if let Some(next_version) = next_version {
                if next_version > shard_version {
                    self.shard.update_domain_notification_version(next_version).await;
                }
            }
            return;
        }

        info!(domains = ?failing_over, "locking task processing for domain failover");
        self.transfer_processor.lock_task_processing().await;
        self.timer_processor.lock_task_processing().await;

        self.transfer_processor.failover_domain(&failing_over).await;
        self.timer_processor.failover_domain(&failing_over).await;

        self.nudge_processors(&failing_over).await;

        match next_version {
            Some(next_version) if next_version > shard_version => {
                self.shard.update_domain_notification_version(next_version).await;
            }
            _ => {
                warn!(
                    shard_version,
                    next_version, "failover observed without a notification version advance"
                );
            }
        }

        self.transfer_processor.unlock_task_processing().await;
        self.timer_processor.unlock_task_processing().await;
        info!(domains = ?failing_over, "unlocked task processing after domain failover");
    }

    /// Force both queue processors to re-scan storage rather than trust
    /// whatever in-memory state they'd built up before the failover, via
    /// a synthetic task per newly-active domain.
    async fn nudge_processors(&self, domain_ids: &[DomainId]) {
        let cluster_name = self.cluster.get_current_cluster_name();
        for domain_id in domain_ids {
            let identity = nudge_identity(domain_id);

            let transfer_task_id = self.shard.get_next_transfer_task_id().await;
            let transfer_spec = TransferSpec { kind: wfh_storage::TransferTaskKind::SyntheticFailoverNudge };
            self.transfer_processor
                .notify_new_task(cluster_name, vec![transfer_spec.into_task(transfer_task_id, &identity)])
                .await;

            let now_ms = self.shard.get_current_time(cluster_name).await;
            let timer_task_id = self.shard.get_next_transfer_task_id().await;
            let timer_spec =
                TimerSpec { kind: wfh_storage::TimerTaskKind::SyntheticFailoverNudge, fire_timestamp_ms: now_ms };
            self.timer_processor
                .notify_new_timers(cluster_name, now_ms, vec![timer_spec.into_task(timer_task_id, &identity)])
                .await;
        }
    }
}

/// A placeholder identity for a synthetic nudge task: it carries no real
/// execution, just the domain being nudged, so the queue processor's
/// re-scan has something to log against.
fn nudge_identity(domain_id: &DomainId) -> wfh_core::ExecutionIdentity {
    wfh_core::ExecutionIdentity::new(
        domain_id.clone(),
        wfh_core::WorkflowId::new("synthetic-failover-nudge"),
        wfh_core::RunId::new(),
    )
}

#[cfg(test)]
#[path = "failover_tests.rs"]
mod tests;
