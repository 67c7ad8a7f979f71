// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Decision`: the commands a workflow decider returns in a decision-task
//! completion, translated by the decision handler into new history events
//! and transfer/timer tasks (§4.3).

use crate::event::RetryPolicy;
use crate::identity::{TaskListName, UserTimerId, WorkflowId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decisionType")]
pub enum Decision {
    ScheduleActivityTask {
        activity_id: String,
        activity_type: String,
        task_list: TaskListName,
        input: String,
        schedule_to_close_timeout_ms: u64,
        schedule_to_start_timeout_ms: u64,
        start_to_close_timeout_ms: u64,
        heartbeat_timeout_ms: u64,
        #[serde(default)]
        retry_policy: Option<RetryPolicy>,
    },

    RequestCancelActivityTask {
        activity_id: String,
    },

    StartTimer {
        timer_id: UserTimerId,
        start_to_fire_timeout_ms: u64,
    },

    CancelTimer {
        timer_id: UserTimerId,
    },

    RecordMarker {
        marker_name: String,
        details: String,
    },

    CompleteWorkflowExecution {
        result: String,
    },

    FailWorkflowExecution {
        reason: String,
        details: String,
    },

    CancelWorkflowExecution {
        details: String,
    },

    ContinueAsNewWorkflowExecution {
        workflow_type: String,
        task_list: TaskListName,
        input: String,
        execution_start_to_close_timeout_ms: u64,
        task_start_to_close_timeout_ms: u64,
        backoff_start_interval_seconds: u32,
    },

    StartChildWorkflowExecution {
        workflow_id: WorkflowId,
        workflow_type: String,
        task_list: TaskListName,
        input: String,
    },

    RequestCancelExternalWorkflowExecution {
        workflow_id: WorkflowId,
        #[serde(default)]
        run_id: Option<String>,
    },

    SignalExternalWorkflowExecution {
        workflow_id: WorkflowId,
        #[serde(default)]
        run_id: Option<String>,
        signal_name: String,
        input: String,
    },
}

impl Decision {
    /// Whether this decision closes the workflow (at most one may appear
    /// per decision-task completion, and it must be the last one applied).
    pub fn is_close_decision(&self) -> bool {
        matches!(
            self,
            Decision::CompleteWorkflowExecution { .. }
                | Decision::FailWorkflowExecution { .. }
                | Decision::CancelWorkflowExecution { .. }
                | Decision::ContinueAsNewWorkflowExecution { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Decision::ScheduleActivityTask { .. } => "ScheduleActivityTask",
            Decision::RequestCancelActivityTask { .. } => "RequestCancelActivityTask",
            Decision::StartTimer { .. } => "StartTimer",
            Decision::CancelTimer { .. } => "CancelTimer",
            Decision::RecordMarker { .. } => "RecordMarker",
            Decision::CompleteWorkflowExecution { .. } => "CompleteWorkflowExecution",
            Decision::FailWorkflowExecution { .. } => "FailWorkflowExecution",
            Decision::CancelWorkflowExecution { .. } => "CancelWorkflowExecution",
            Decision::ContinueAsNewWorkflowExecution { .. } => "ContinueAsNewWorkflowExecution",
            Decision::StartChildWorkflowExecution { .. } => "StartChildWorkflowExecution",
            Decision::RequestCancelExternalWorkflowExecution { .. } => {
                "RequestCancelExternalWorkflowExecution"
            }
            Decision::SignalExternalWorkflowExecution { .. } => "SignalExternalWorkflowExecution",
        }
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
