// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TimerBuilder` (§4.1, §4.3, §4.4): pure computation of the timer tasks
//! owed by a mutable state at a given point. Kept free of task IDs and
//! execution identity so it stays a pure function of its inputs; the
//! caller (engine/decision handler) stamps those on right before persist.

use wfh_core::{ActivityInfo, DecisionInfo, ExecutionIdentity, MutableState};
use wfh_storage::{TimerTask, TimerTaskKind, TransferTaskKind};

/// A timer task not yet assigned a durable `task_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSpec {
    pub kind: TimerTaskKind,
    pub fire_timestamp_ms: i64,
}

impl TimerSpec {
    pub fn into_task(self, task_id: i64, identity: &ExecutionIdentity) -> TimerTask {
        TimerTask {
            task_id,
            domain_id: identity.domain_id.clone(),
            workflow_id: identity.workflow_id.clone(),
            run_id: identity.run_id.clone(),
            fire_timestamp_ms: self.fire_timestamp_ms,
            kind: self.kind,
        }
    }
}

/// `WorkflowTimeoutTask` at `now + executionTimeout (+ cronBackoff)` (§4.4 step 4).
pub fn workflow_timeout(state: &MutableState) -> Option<TimerSpec> {
    state
        .execution_info
        .workflow_expiration_timestamp_ms
        .map(|fire_timestamp_ms| TimerSpec { kind: TimerTaskKind::WorkflowTimeout, fire_timestamp_ms })
}

/// `WorkflowBackoffTimerTask`, added when the first decision task is
/// cron-delayed (§4.4 step 4).
pub fn workflow_backoff(fire_timestamp_ms: i64) -> TimerSpec {
    TimerSpec { kind: TimerTaskKind::WorkflowBackoff, fire_timestamp_ms }
}

/// Schedule-to-close timeout for an outstanding decision task.
pub fn decision_timeout(decision: &DecisionInfo, scheduled_timestamp_ms: i64) -> TimerSpec {
    TimerSpec {
        kind: TimerTaskKind::DecisionTimeout { schedule_id: decision.schedule_id, attempt: decision.attempt },
        fire_timestamp_ms: scheduled_timestamp_ms + decision.start_to_close_timeout_ms as i64,
    }
}

/// Sticky schedule-to-start timeout, added only when the decision was
/// scheduled on a sticky task list (§4.3).
pub fn decision_schedule_to_start(
    decision: &DecisionInfo,
    scheduled_timestamp_ms: i64,
    sticky_schedule_to_start_timeout_ms: u64,
) -> TimerSpec {
    TimerSpec {
        kind: TimerTaskKind::DecisionScheduleToStart { schedule_id: decision.schedule_id },
        fire_timestamp_ms: scheduled_timestamp_ms + sticky_schedule_to_start_timeout_ms as i64,
    }
}

/// Schedule-to-close timeout for a newly scheduled activity.
pub fn activity_timeout(activity: &ActivityInfo, scheduled_timestamp_ms: i64) -> TimerSpec {
    TimerSpec {
        kind: TimerTaskKind::ActivityTimeout { schedule_id: activity.schedule_id, attempt: activity.attempt },
        fire_timestamp_ms: scheduled_timestamp_ms + activity.schedule_to_close_timeout_ms as i64,
    }
}

/// Retry backoff timer for a failed activity whose retry policy allows
/// another attempt.
pub fn activity_retry_backoff(activity: &ActivityInfo, fire_timestamp_ms: i64) -> TimerSpec {
    TimerSpec {
        kind: TimerTaskKind::ActivityRetryBackoff { schedule_id: activity.schedule_id, attempt: activity.attempt },
        fire_timestamp_ms,
    }
}

/// Retention-delete timer fired `retention_ms` after close.
pub fn retention_delete(now_ms: i64, retention_ms: i64) -> TimerSpec {
    TimerSpec { kind: TimerTaskKind::RetentionDelete, fire_timestamp_ms: now_ms + retention_ms }
}

/// The pair of cleanup tasks generated whenever a run closes: a transfer
/// task to run close hooks (archival trigger, visibility close) and a
/// timer task to eventually delete the history (§4.3 step 4).
pub fn close_cleanup_tasks(now_ms: i64, retention_ms: i64) -> (TransferTaskKind, TimerSpec) {
    (TransferTaskKind::CloseExecution, retention_delete(now_ms, retention_ms))
}

#[cfg(test)]
#[path = "timer_builder_tests.rs"]
mod tests;
