// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain metadata and the workflow-ID reuse policy (§4.7, §4.8, §6).

use serde::{Deserialize, Serialize};
use wfh_core::DomainId;

/// What to do with a prior run for the same `WorkflowId` (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowIdReusePolicy {
    AllowDuplicate,
    AllowDuplicateFailedOnly,
    RejectDuplicate,
}

/// Replication configuration for a domain: whether it is global (multi-
/// cluster) and, if so, which cluster is currently active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReplicationConfig {
    pub is_global_domain: bool,
    pub active_cluster_name: String,
    pub clusters: Vec<String>,
}

/// One domain's cached metadata, as seen by `DomainCache` (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub domain_id: DomainId,
    pub name: String,
    pub replication: DomainReplicationConfig,
    /// Monotonically increasing version bumped on every domain-cache
    /// change; compared against the shard's own notification version to
    /// detect failovers this shard hasn't yet observed (§4.8).
    pub failover_notification_version: i64,
    pub failover_version: i64,
}

impl Domain {
    pub fn is_active_in(&self, current_cluster: &str) -> bool {
        self.replication.active_cluster_name == current_cluster
    }
}
