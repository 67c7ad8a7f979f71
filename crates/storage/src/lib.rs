// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wfh-storage: the collaborator port traits the engine depends on
//! (`ShardContext`, `HistoryManager`, `ExecutionManager`, `DomainCache`,
//! the transfer/timer queue processors, and the opaque downstream
//! clients), the domain and task vocabulary they traffic in, and — behind
//! the `test-support` feature — an in-memory implementation of every one
//! of them.

pub mod domain;
pub mod ports;
pub mod tasks;

#[cfg(feature = "test-support")]
pub mod fakes;

pub use domain::{Domain, DomainReplicationConfig, WorkflowIdReusePolicy};
pub use ports::{
    ActivitySyncInfo, ArchivalClient, ClusterMetadata, CreateWorkflowExecutionRequest, CreateWorkflowMode,
    CurrentExecutionRecord, DomainCache, DomainChangeCallback, ExecutionManager, HistoryClient, HistoryManager,
    MatchingClient, PersistError, PublicClient, ReplicationError, Replicator, ReplicatorProcessor, ShardContext,
    ShardError, TimerQueueProcessor, TransferQueueProcessor, UpdateWorkflowExecutionRequest, VisibilityManager,
};
pub use tasks::{TimerTask, TimerTaskKind, TransferTask, TransferTaskKind};
