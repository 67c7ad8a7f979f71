// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wfh-engine: the per-shard workflow history engine built on top of
//! wfh-core's event-sourcing primitives and wfh-storage's collaborator
//! ports.
//!
//! [`ExecutionCache`] and the OCC loop in [`occ`] provide the
//! load-mutate-persist-retry cycle every write goes through; [`decision_handler`]
//! implements the decision-batch state machine that drives most of those
//! writes; [`engine::Engine`] is the façade tying the whole thing together
//! for a caller (a daemon's RPC surface, or — here — the scenario runner in
//! wfh-daemon).

pub mod cron;
pub mod decision_handler;
pub mod engine;
pub mod execution_cache;
pub mod failover;
pub mod metrics;
pub mod notifier;
pub mod occ;
pub mod shard_wrapper;
pub mod timer_builder;

pub use decision_handler::{
    DecisionTaskCompletedResult, DecisionTaskCompletionRequest, InlineDecisionTask, StickyAttributes,
};
pub use engine::{
    Engine, EngineComponents, GetMutableStateResponse, RespondDecisionTaskCompletedResponse,
    SignalWithStartRequest, SignalWorkflowRequest, StartWorkflowRequest,
};
pub use execution_cache::{ExecutionCache, ExecutionLease, GetAndCreate};
pub use failover::FailoverCoordinator;
pub use metrics::{EngineMetrics, EngineMetricsSnapshot};
pub use notifier::{HistoryEventNotifier, NotifierState};
pub use occ::{MutationOutcome, OccRuntime, TransferSpec};
pub use shard_wrapper::ShardContextWrapper;
pub use timer_builder::TimerSpec;
