// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HistoryEvent`: the deterministic, append-only log that defines one
//! workflow execution.
//!
//! Serializes as `{"type": "namespace:verb", ...fields}`, mirroring the
//! tagged-enum event-log convention used throughout this codebase. Unknown
//! type tags deserialize to `Custom` rather than failing, so history
//! written by a newer binary can still be replayed by an older one.

use crate::id::EventId;
use crate::identity::{RunId, UserTimerId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a workflow closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseStatus {
    Completed,
    Failed,
    Canceled,
    Terminated,
    TimedOut,
    ContinuedAsNew,
}

crate::simple_display! {
    CloseStatus {
        Completed => "Completed",
        Failed => "Failed",
        Canceled => "Canceled",
        Terminated => "Terminated",
        TimedOut => "TimedOut",
        ContinuedAsNew => "ContinuedAsNew",
    }
}

/// What triggered a continue-as-new event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinueAsNewInitiator {
    Decider,
    RetryPolicy,
    CronSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetryPolicy {
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    pub maximum_interval_ms: u64,
    pub maximum_attempts: u32,
    pub non_retriable_error_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
}

/// Events that drive a `MutableState`'s transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HistoryEvent {
    #[serde(rename = "workflow:started")]
    WorkflowExecutionStarted {
        workflow_type: WorkflowType,
        task_list: String,
        input: HashMap<String, String>,
        execution_start_to_close_timeout_ms: u64,
        task_start_to_close_timeout_ms: u64,
        request_id: String,
        #[serde(default)]
        cron_schedule: Option<String>,
        #[serde(default)]
        retry_policy: Option<RetryPolicy>,
        #[serde(default)]
        attempt: u32,
        #[serde(default)]
        parent_workflow: Option<(WorkflowId, RunId)>,
        #[serde(default)]
        continued_from_run_id: Option<RunId>,
        #[serde(default)]
        first_decision_task_backoff_seconds: u32,
    },

    #[serde(rename = "workflow:signaled")]
    WorkflowExecutionSignaled { signal_name: String, input: String, request_id: String },

    #[serde(rename = "workflow:cancel_requested")]
    WorkflowExecutionCancelRequested { cause: String },

    #[serde(rename = "workflow:completed")]
    WorkflowExecutionCompleted { result: String, decision_task_completed_event_id: EventId },

    #[serde(rename = "workflow:failed")]
    WorkflowExecutionFailed {
        reason: String,
        details: String,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "workflow:canceled")]
    WorkflowExecutionCanceled { details: String, decision_task_completed_event_id: EventId },

    #[serde(rename = "workflow:terminated")]
    WorkflowExecutionTerminated { reason: String, details: String },

    #[serde(rename = "workflow:timed_out")]
    WorkflowExecutionTimedOut,

    #[serde(rename = "workflow:continued_as_new")]
    WorkflowExecutionContinuedAsNew {
        new_run_id: RunId,
        workflow_type: WorkflowType,
        task_list: String,
        input: HashMap<String, String>,
        execution_start_to_close_timeout_ms: u64,
        task_start_to_close_timeout_ms: u64,
        backoff_start_interval_seconds: u32,
        initiator: ContinueAsNewInitiator,
        #[serde(default)]
        failure_reason: Option<String>,
        #[serde(default)]
        last_completion_result: Option<String>,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "decision:scheduled")]
    DecisionTaskScheduled {
        task_list: String,
        start_to_close_timeout_ms: u64,
        attempt: u32,
    },

    #[serde(rename = "decision:started")]
    DecisionTaskStarted { scheduled_event_id: EventId, request_id: String },

    #[serde(rename = "decision:completed")]
    DecisionTaskCompleted {
        scheduled_event_id: EventId,
        started_event_id: EventId,
        #[serde(default)]
        binary_checksum: Option<String>,
    },

    #[serde(rename = "decision:failed")]
    DecisionTaskFailed {
        scheduled_event_id: EventId,
        started_event_id: EventId,
        cause: String,
    },

    #[serde(rename = "decision:timed_out")]
    DecisionTaskTimedOut { scheduled_event_id: EventId, started_event_id: EventId },

    #[serde(rename = "activity:scheduled")]
    ActivityTaskScheduled {
        activity_id: String,
        activity_type: String,
        task_list: String,
        input: String,
        schedule_to_close_timeout_ms: u64,
        schedule_to_start_timeout_ms: u64,
        start_to_close_timeout_ms: u64,
        heartbeat_timeout_ms: u64,
        #[serde(default)]
        retry_policy: Option<RetryPolicy>,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "activity:started")]
    ActivityTaskStarted { scheduled_event_id: EventId, request_id: String, attempt: u32 },

    #[serde(rename = "activity:completed")]
    ActivityTaskCompleted { scheduled_event_id: EventId, started_event_id: EventId, result: String },

    #[serde(rename = "activity:failed")]
    ActivityTaskFailed {
        scheduled_event_id: EventId,
        started_event_id: EventId,
        reason: String,
        details: String,
    },

    #[serde(rename = "activity:timed_out")]
    ActivityTaskTimedOut { scheduled_event_id: EventId, started_event_id: Option<EventId> },

    #[serde(rename = "activity:cancel_requested")]
    ActivityTaskCancelRequested { scheduled_event_id: EventId, decision_task_completed_event_id: EventId },

    #[serde(rename = "activity:canceled")]
    ActivityTaskCanceled {
        scheduled_event_id: EventId,
        started_event_id: Option<EventId>,
        details: String,
    },

    #[serde(rename = "timer:started")]
    TimerStarted {
        timer_id: UserTimerId,
        start_to_fire_timeout_ms: u64,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "timer:fired")]
    TimerFired { timer_id: UserTimerId, started_event_id: EventId },

    #[serde(rename = "timer:canceled")]
    TimerCanceled { timer_id: UserTimerId, started_event_id: EventId, decision_task_completed_event_id: EventId },

    #[serde(rename = "marker:recorded")]
    MarkerRecorded { marker_name: String, details: String, decision_task_completed_event_id: EventId },

    #[serde(rename = "child:initiated")]
    StartChildWorkflowExecutionInitiated {
        workflow_id: WorkflowId,
        workflow_type: WorkflowType,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "child:started")]
    ChildWorkflowExecutionStarted { initiated_event_id: EventId, run_id: RunId },

    #[serde(rename = "external:cancel_initiated")]
    RequestCancelExternalWorkflowExecutionInitiated {
        workflow_id: WorkflowId,
        run_id: Option<RunId>,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "external:cancel_requested")]
    ExternalWorkflowExecutionCancelRequested { initiated_event_id: EventId },

    #[serde(rename = "external:signal_initiated")]
    SignalExternalWorkflowExecutionInitiated {
        workflow_id: WorkflowId,
        run_id: Option<RunId>,
        signal_name: String,
        decision_task_completed_event_id: EventId,
    },

    #[serde(rename = "external:signaled")]
    ExternalWorkflowExecutionSignaled { initiated_event_id: EventId },

    /// Catch-all for unrecognized event types (forward compatibility).
    #[serde(other, skip_serializing)]
    Custom,
}

/// One entry in an execution's history: the envelope (event ID, wall-clock
/// timestamp) plus the event-specific attributes.
///
/// Event IDs are assigned by [`crate::mutable_state::MutableState`] at
/// append time and are exactly the event's 1-based position in the run's
/// history; they are never reused, even across a failed-and-retried
/// decision task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEventRecord {
    pub event_id: EventId,
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub event: HistoryEvent,
}

impl HistoryEventRecord {
    pub fn new(event_id: EventId, timestamp_ms: i64, event: HistoryEvent) -> Self {
        Self { event_id, timestamp_ms, event }
    }
}

impl HistoryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HistoryEvent::WorkflowExecutionStarted { .. } => "workflow:started",
            HistoryEvent::WorkflowExecutionSignaled { .. } => "workflow:signaled",
            HistoryEvent::WorkflowExecutionCancelRequested { .. } => "workflow:cancel_requested",
            HistoryEvent::WorkflowExecutionCompleted { .. } => "workflow:completed",
            HistoryEvent::WorkflowExecutionFailed { .. } => "workflow:failed",
            HistoryEvent::WorkflowExecutionCanceled { .. } => "workflow:canceled",
            HistoryEvent::WorkflowExecutionTerminated { .. } => "workflow:terminated",
            HistoryEvent::WorkflowExecutionTimedOut => "workflow:timed_out",
            HistoryEvent::WorkflowExecutionContinuedAsNew { .. } => "workflow:continued_as_new",
            HistoryEvent::DecisionTaskScheduled { .. } => "decision:scheduled",
            HistoryEvent::DecisionTaskStarted { .. } => "decision:started",
            HistoryEvent::DecisionTaskCompleted { .. } => "decision:completed",
            HistoryEvent::DecisionTaskFailed { .. } => "decision:failed",
            HistoryEvent::DecisionTaskTimedOut { .. } => "decision:timed_out",
            HistoryEvent::ActivityTaskScheduled { .. } => "activity:scheduled",
            HistoryEvent::ActivityTaskStarted { .. } => "activity:started",
            HistoryEvent::ActivityTaskCompleted { .. } => "activity:completed",
            HistoryEvent::ActivityTaskFailed { .. } => "activity:failed",
            HistoryEvent::ActivityTaskTimedOut { .. } => "activity:timed_out",
            HistoryEvent::ActivityTaskCancelRequested { .. } => "activity:cancel_requested",
            HistoryEvent::ActivityTaskCanceled { .. } => "activity:canceled",
            HistoryEvent::TimerStarted { .. } => "timer:started",
            HistoryEvent::TimerFired { .. } => "timer:fired",
            HistoryEvent::TimerCanceled { .. } => "timer:canceled",
            HistoryEvent::MarkerRecorded { .. } => "marker:recorded",
            HistoryEvent::StartChildWorkflowExecutionInitiated { .. } => "child:initiated",
            HistoryEvent::ChildWorkflowExecutionStarted { .. } => "child:started",
            HistoryEvent::RequestCancelExternalWorkflowExecutionInitiated { .. } => {
                "external:cancel_initiated"
            }
            HistoryEvent::ExternalWorkflowExecutionCancelRequested { .. } => {
                "external:cancel_requested"
            }
            HistoryEvent::SignalExternalWorkflowExecutionInitiated { .. } => {
                "external:signal_initiated"
            }
            HistoryEvent::ExternalWorkflowExecutionSignaled { .. } => "external:signaled",
            HistoryEvent::Custom => "custom",
        }
    }

    /// Whether this event closes the run — no further events may be
    /// appended after it (invariant 4).
    pub fn is_close_event(&self) -> bool {
        matches!(
            self,
            HistoryEvent::WorkflowExecutionCompleted { .. }
                | HistoryEvent::WorkflowExecutionFailed { .. }
                | HistoryEvent::WorkflowExecutionCanceled { .. }
                | HistoryEvent::WorkflowExecutionTerminated { .. }
                | HistoryEvent::WorkflowExecutionTimedOut
                | HistoryEvent::WorkflowExecutionContinuedAsNew { .. }
        )
    }

    pub fn close_status(&self) -> Option<CloseStatus> {
        match self {
            HistoryEvent::WorkflowExecutionCompleted { .. } => Some(CloseStatus::Completed),
            HistoryEvent::WorkflowExecutionFailed { .. } => Some(CloseStatus::Failed),
            HistoryEvent::WorkflowExecutionCanceled { .. } => Some(CloseStatus::Canceled),
            HistoryEvent::WorkflowExecutionTerminated { .. } => Some(CloseStatus::Terminated),
            HistoryEvent::WorkflowExecutionTimedOut => Some(CloseStatus::TimedOut),
            HistoryEvent::WorkflowExecutionContinuedAsNew { .. } => {
                Some(CloseStatus::ContinuedAsNew)
            }
            _ => None,
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            HistoryEvent::WorkflowExecutionStarted { workflow_type, .. } => {
                format!("{t} workflow_type={}", workflow_type.name)
            }
            HistoryEvent::WorkflowExecutionSignaled { signal_name, .. } => {
                format!("{t} signal={signal_name}")
            }
            HistoryEvent::ActivityTaskScheduled { activity_id, activity_type, .. } => {
                format!("{t} activity_id={activity_id} activity_type={activity_type}")
            }
            HistoryEvent::TimerStarted { timer_id, .. } => format!("{t} timer_id={timer_id}"),
            HistoryEvent::TimerFired { timer_id, .. } => format!("{t} timer_id={timer_id}"),
            HistoryEvent::DecisionTaskFailed { cause, .. } => format!("{t} cause={cause}"),
            HistoryEvent::WorkflowExecutionTerminated { reason, .. } => {
                format!("{t} reason={reason}")
            }
            _ => t.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
