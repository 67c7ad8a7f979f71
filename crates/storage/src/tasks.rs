// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transfer and timer task vocabulary (§3, §4.2, §6).
//!
//! Tasks are the durable record of work a write generates beyond the
//! history event itself: cross-shard/cross-system effects (transfer tasks)
//! and time-based fires (timer tasks). Both are written atomically with
//! the history and mutable-state delta that produced them, and are handed
//! to the transfer/timer queue processors after a successful persist.

use serde::{Deserialize, Serialize};
use wfh_core::{DomainId, EventId, RunId, WorkflowId};

/// A durable record of cross-shard or cross-system work, drained by the
/// transfer queue processor in FIFO order per shard (§5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTask {
    pub task_id: i64,
    pub domain_id: DomainId,
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub kind: TransferTaskKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferTaskKind {
    /// Notify the visibility store a new execution was recorded.
    RecordWorkflowStarted,
    /// Dispatch a decision task to the matching service.
    DecisionTask { schedule_id: EventId, task_list: String },
    /// Dispatch an activity task to the matching service.
    ActivityTask { schedule_id: EventId, task_list: String },
    /// Resolve and start a child workflow execution.
    StartChildExecution { initiated_id: EventId, child_workflow_id: WorkflowId },
    /// Request cancellation of a foreign workflow execution.
    CancelExecution { initiated_id: EventId, target_domain_id: DomainId, target_workflow_id: WorkflowId },
    /// Signal a foreign workflow execution.
    SignalExecution { initiated_id: EventId, target_domain_id: DomainId, target_workflow_id: WorkflowId },
    /// Run workflow-close cleanup hooks (archival trigger, visibility close).
    CloseExecution,
    /// Synthetic task used to force a domain-failover re-scan (§4.8). Carries
    /// no real work; its only effect is waking the processor's DB scan.
    SyntheticFailoverNudge,
}

/// A durable record that fires at or after a specified time, drained by the
/// timer queue processor in fire-time order (§5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerTask {
    pub task_id: i64,
    pub domain_id: DomainId,
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub fire_timestamp_ms: i64,
    pub kind: TimerTaskKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerTaskKind {
    WorkflowTimeout,
    WorkflowBackoff,
    DecisionTimeout { schedule_id: EventId, attempt: u32 },
    DecisionScheduleToStart { schedule_id: EventId },
    ActivityTimeout { schedule_id: EventId, attempt: u32 },
    ActivityRetryBackoff { schedule_id: EventId, attempt: u32 },
    UserTimer { timer_id: String },
    RetentionDelete,
    /// Synthetic task used to force a domain-failover re-scan (§4.8).
    SyntheticFailoverNudge,
}

impl TimerTask {
    /// A stable sort key matching the timer queue processor's fire-time
    /// ordering (§5): earliest fire time first, task ID breaks ties.
    pub fn sort_key(&self) -> (i64, i64) {
        (self.fire_timestamp_ms, self.task_id)
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
