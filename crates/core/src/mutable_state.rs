// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `MutableState`: the derived, in-memory view of one workflow execution,
//! rebuilt by folding [`HistoryEvent`]s in order.
//!
//! This is the event-sourcing aggregate at the center of the engine.
//! Nothing here talks to storage or the clock directly; [`MutableState`]
//! is pure data plus a pure fold function, which is what makes replay
//! deterministic and the cache's OCC loop possible.

use crate::error::{HistoryError, HistoryResult};
use crate::event::{
    CloseStatus, ContinueAsNewInitiator, HistoryEvent, HistoryEventRecord, RetryPolicy, WorkflowType,
};
use crate::id::{EventId, InitiatedId, ScheduleId};
use crate::identity::{ExecutionIdentity, RunId, TaskListName, UserTimerId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Coarse execution lifecycle state, derived from the most recent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Created,
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub identity: ExecutionIdentity,
    pub workflow_type: WorkflowType,
    pub task_list: TaskListName,
    pub state: ExecutionState,
    pub close_status: Option<CloseStatus>,
    pub start_timestamp_ms: i64,
    pub last_updated_timestamp_ms: i64,
    pub execution_start_to_close_timeout_ms: u64,
    pub task_start_to_close_timeout_ms: u64,
    pub attempt: u32,
    pub cron_schedule: Option<String>,
    pub sticky_task_list: Option<TaskListName>,
    pub sticky_schedule_to_start_timeout_ms: u64,
    /// Set once the workflow's execution start-to-close deadline is known,
    /// so the timer builder can schedule a `WorkflowExecutionTimedOut` task.
    pub workflow_expiration_timestamp_ms: Option<i64>,
    /// The request ID `StartWorkflow` was invoked with. Compared against an
    /// incoming duplicate start's request ID for §4.4 idempotency.
    pub start_request_id: String,
    pub retry_policy: Option<RetryPolicy>,
    pub parent: Option<(WorkflowId, RunId)>,
    /// Number of `WorkflowExecutionSignaled` events applied so far, checked
    /// against `ShardConfig::maximum_signals_per_execution`.
    pub signal_count: u64,
    /// Most recent binary-checksum decision completions a reset could target,
    /// oldest-first, capped at `ShardConfig::max_auto_reset_points`.
    pub auto_reset_points: Vec<AutoResetPoint>,
}

/// One candidate point a workflow could be reset to: a `DecisionTaskCompleted`
/// event, its worker binary checksum, and when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoResetPoint {
    pub event_id: EventId,
    pub binary_checksum: Option<String>,
    pub created_timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub schedule_id: ScheduleId,
    pub activity_id: String,
    pub activity_type: String,
    pub task_list: TaskListName,
    pub input: String,
    pub started_id: Option<EventId>,
    pub request_id: Option<String>,
    pub attempt: u32,
    pub schedule_to_close_timeout_ms: u64,
    pub schedule_to_start_timeout_ms: u64,
    pub start_to_close_timeout_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub last_heartbeat_timestamp_ms: Option<i64>,
    pub last_heartbeat_details: Option<String>,
    pub cancel_requested: bool,
    /// Retained from the scheduling event so a retriable failure (§4.5) can
    /// re-dispatch the same activity without a worker round-trip.
    pub retry_policy: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInfo {
    pub schedule_id: ScheduleId,
    pub started_id: Option<EventId>,
    pub request_id: Option<String>,
    pub attempt: u32,
    pub start_to_close_timeout_ms: u64,
    /// Task list the decision was scheduled on. Differs from
    /// `ExecutionInfo::task_list` when a sticky task list is in use.
    pub task_list: TaskListName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerInfo {
    pub started_id: EventId,
    pub fire_timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildInfo {
    pub initiated_id: InitiatedId,
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelInfo {
    pub initiated_id: InitiatedId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    pub initiated_id: InitiatedId,
    pub signal_name: String,
}

/// Replication bookkeeping for multi-cluster domains. `None` for
/// single-cluster (local) domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationState {
    pub current_version: i64,
    pub start_version: i64,
    pub last_write_version: i64,
    pub last_write_event_id: EventId,
}

/// The full derived state of one workflow execution.
///
/// `next_event_id` doubles as the OCC condition number: a conditional
/// append to storage succeeds only if the caller's expected
/// `next_event_id` still matches what's on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutableState {
    pub execution_info: ExecutionInfo,
    pub next_event_id: EventId,

    pub pending_activities: HashMap<ScheduleId, ActivityInfo>,
    pub pending_decision: Option<DecisionInfo>,
    pub pending_timers: HashMap<UserTimerId, TimerInfo>,
    pub pending_children: HashMap<InitiatedId, ChildInfo>,
    pub pending_request_cancels: HashMap<InitiatedId, RequestCancelInfo>,
    pub pending_signals: HashMap<InitiatedId, SignalInfo>,

    /// Request IDs of signals already applied, for `SignalWithStart`
    /// and direct-signal de-duplication.
    pub signals_requested: HashSet<String>,

    /// Events that arrived while a decision task was outstanding and are
    /// held until that task completes, fails, or times out (§3 invariant
    /// on decision task isolation).
    pub buffered_events: Vec<HistoryEvent>,

    pub replication_state: Option<ReplicationState>,
}

impl MutableState {
    /// Construct the state resulting from a `WorkflowExecutionStarted`
    /// event, the only event type allowed to start a run.
    pub fn new_from_start(
        identity: ExecutionIdentity,
        event_id: EventId,
        timestamp_ms: i64,
        event: &HistoryEvent,
    ) -> HistoryResult<Self> {
        let HistoryEvent::WorkflowExecutionStarted {
            workflow_type,
            task_list,
            execution_start_to_close_timeout_ms,
            task_start_to_close_timeout_ms,
            attempt,
            cron_schedule,
            request_id,
            retry_policy,
            parent_workflow,
            ..
        } = event
        else {
            return Err(HistoryError::bad_request(
                "first event of a run must be WorkflowExecutionStarted",
            ));
        };
        if event_id != EventId::FIRST {
            return Err(HistoryError::bad_request("WorkflowExecutionStarted must be event 1"));
        }
        let expiration = if *execution_start_to_close_timeout_ms > 0 {
            Some(timestamp_ms + *execution_start_to_close_timeout_ms as i64)
        } else {
            None
        };
        Ok(Self {
            execution_info: ExecutionInfo {
                identity,
                workflow_type: workflow_type.clone(),
                task_list: TaskListName::new(task_list),
                state: ExecutionState::Created,
                close_status: None,
                start_timestamp_ms: timestamp_ms,
                last_updated_timestamp_ms: timestamp_ms,
                execution_start_to_close_timeout_ms: *execution_start_to_close_timeout_ms,
                task_start_to_close_timeout_ms: *task_start_to_close_timeout_ms,
                attempt: *attempt,
                cron_schedule: cron_schedule.clone(),
                sticky_task_list: None,
                sticky_schedule_to_start_timeout_ms: 0,
                workflow_expiration_timestamp_ms: expiration,
                start_request_id: request_id.clone(),
                retry_policy: retry_policy.clone(),
                parent: parent_workflow.clone(),
                signal_count: 0,
                auto_reset_points: Vec::new(),
            },
            next_event_id: event_id.next(),
            pending_activities: HashMap::new(),
            pending_decision: None,
            pending_timers: HashMap::new(),
            pending_children: HashMap::new(),
            pending_request_cancels: HashMap::new(),
            pending_signals: HashMap::new(),
            signals_requested: HashSet::new(),
            buffered_events: Vec::new(),
            replication_state: None,
        })
    }

    /// Rebuild state from scratch by folding a full history in order.
    /// Calling this twice on the same history yields bit-identical
    /// states (the idempotence law §8 relies on).
    pub fn rebuild_from_history(
        identity: ExecutionIdentity,
        records: &[HistoryEventRecord],
    ) -> HistoryResult<Self> {
        let (first, rest) = records
            .split_first()
            .ok_or_else(|| HistoryError::bad_request("history must have at least one event"))?;
        let mut state =
            Self::new_from_start(identity, first.event_id, first.timestamp_ms, &first.event)?;
        for record in rest {
            state.apply_event(record)?;
        }
        Ok(state)
    }

    pub fn is_closed(&self) -> bool {
        self.execution_info.state == ExecutionState::Completed
    }

    /// Whether a new event may be appended right now. False once the run
    /// has closed (invariant: the close event is always the last event).
    pub fn can_append(&self) -> bool {
        !self.is_closed()
    }

    /// The OCC condition number expected by the next conditional append.
    pub fn condition(&self) -> EventId {
        self.next_event_id
    }

    /// Apply one already-assigned, already-ordered history event, folding
    /// it into derived state and bumping `next_event_id`. This is the pure
    /// replay primitive: it has no opinion about decision-task buffering,
    /// because a stored history is always the flat sequence with buffered
    /// events already resolved into their final positions.
    pub fn apply_event(&mut self, record: &HistoryEventRecord) -> HistoryResult<()> {
        if self.is_closed() {
            return Err(HistoryError::bad_request("cannot apply event to closed execution"));
        }
        if record.event_id != self.next_event_id {
            return Err(HistoryError::bad_request(format!(
                "out-of-order event: expected {}, got {}",
                self.next_event_id, record.event_id
            )));
        }
        self.apply_unbuffered(record)?;
        self.execution_info.last_updated_timestamp_ms = record.timestamp_ms;
        self.next_event_id = self.next_event_id.next();
        Ok(())
    }

    /// Record a newly occurring event against live state. If a decision
    /// task is outstanding and this event isn't part of that task's own
    /// lifecycle, it's held in `buffered_events` rather than committed
    /// immediately (§3 invariant on decision task isolation) and `Ok(&[])`
    /// is returned — nothing new for the caller to persist as history yet.
    ///
    /// Otherwise the event is assigned the next sequential ID, applied,
    /// and — if it closes the outstanding decision task — every buffered
    /// event is drained right behind it, each getting its own sequential
    /// ID in arrival order. The full list of newly committed records is
    /// returned for the caller to append to durable history.
    pub fn record_live_event(
        &mut self,
        event: HistoryEvent,
        timestamp_ms: i64,
    ) -> HistoryResult<Vec<HistoryEventRecord>> {
        if !self.can_append() {
            return Err(HistoryError::bad_request("cannot record event on closed execution"));
        }
        if self.pending_decision.is_some() && !is_decision_task_lifecycle_event(&event) {
            self.buffered_events.push(event);
            return Ok(Vec::new());
        }

        let closes_decision = is_decision_closing_event(&event);
        let record = HistoryEventRecord::new(self.next_event_id, timestamp_ms, event);
        self.apply_event(&record)?;
        let mut committed = vec![record];

        if closes_decision {
            let buffered = std::mem::take(&mut self.buffered_events);
            for buffered_event in buffered {
                let buffered_record =
                    HistoryEventRecord::new(self.next_event_id, timestamp_ms, buffered_event);
                self.apply_event(&buffered_record)?;
                committed.push(buffered_record);
            }
        }
        Ok(committed)
    }

    fn apply_unbuffered(&mut self, record: &HistoryEventRecord) -> HistoryResult<()> {
        match &record.event {
            HistoryEvent::WorkflowExecutionStarted { .. } => {
                return Err(HistoryError::bad_request(
                    "WorkflowExecutionStarted may only be the first event",
                ));
            }

            HistoryEvent::WorkflowExecutionSignaled { request_id, .. } => {
                self.signals_requested.insert(request_id.clone());
                self.execution_info.signal_count += 1;
            }

            HistoryEvent::WorkflowExecutionCancelRequested { .. } => {}

            HistoryEvent::DecisionTaskScheduled { task_list, start_to_close_timeout_ms, attempt } => {
                self.pending_decision = Some(DecisionInfo {
                    schedule_id: record.event_id,
                    started_id: None,
                    request_id: None,
                    attempt: *attempt,
                    start_to_close_timeout_ms: *start_to_close_timeout_ms,
                    task_list: TaskListName::new(task_list),
                });
                self.execution_info.state = ExecutionState::Running;
            }

            HistoryEvent::DecisionTaskStarted { scheduled_event_id, request_id } => {
                let decision = self.decision_mut(*scheduled_event_id)?;
                decision.started_id = Some(record.event_id);
                decision.request_id = Some(request_id.clone());
            }

            HistoryEvent::DecisionTaskCompleted { scheduled_event_id, .. }
            | HistoryEvent::DecisionTaskFailed { scheduled_event_id, .. }
            | HistoryEvent::DecisionTaskTimedOut { scheduled_event_id, .. } => {
                self.require_decision(*scheduled_event_id)?;
                self.pending_decision = None;
            }

            HistoryEvent::ActivityTaskScheduled {
                activity_id,
                activity_type,
                task_list,
                input,
                schedule_to_close_timeout_ms,
                schedule_to_start_timeout_ms,
                start_to_close_timeout_ms,
                heartbeat_timeout_ms,
                retry_policy,
                ..
            } => {
                self.pending_activities.insert(
                    record.event_id,
                    ActivityInfo {
                        schedule_id: record.event_id,
                        activity_id: activity_id.clone(),
                        activity_type: activity_type.clone(),
                        task_list: TaskListName::new(task_list),
                        input: input.clone(),
                        started_id: None,
                        request_id: None,
                        attempt: 0,
                        schedule_to_close_timeout_ms: *schedule_to_close_timeout_ms,
                        schedule_to_start_timeout_ms: *schedule_to_start_timeout_ms,
                        start_to_close_timeout_ms: *start_to_close_timeout_ms,
                        heartbeat_timeout_ms: *heartbeat_timeout_ms,
                        last_heartbeat_timestamp_ms: None,
                        last_heartbeat_details: None,
                        cancel_requested: false,
                        retry_policy: retry_policy.clone(),
                    },
                );
            }

            HistoryEvent::ActivityTaskStarted { scheduled_event_id, request_id, attempt } => {
                let activity = self.activity_mut(*scheduled_event_id)?;
                activity.started_id = Some(record.event_id);
                activity.request_id = Some(request_id.clone());
                activity.attempt = *attempt;
            }

            HistoryEvent::ActivityTaskCompleted { scheduled_event_id, .. }
            | HistoryEvent::ActivityTaskFailed { scheduled_event_id, .. }
            | HistoryEvent::ActivityTaskCanceled { scheduled_event_id, .. } => {
                self.require_activity(*scheduled_event_id)?;
                self.pending_activities.remove(scheduled_event_id);
            }

            HistoryEvent::ActivityTaskTimedOut { scheduled_event_id, .. } => {
                self.require_activity(*scheduled_event_id)?;
                self.pending_activities.remove(scheduled_event_id);
            }

            HistoryEvent::ActivityTaskCancelRequested { scheduled_event_id, .. } => {
                let activity = self.activity_mut(*scheduled_event_id)?;
                activity.cancel_requested = true;
            }

            HistoryEvent::TimerStarted { timer_id, .. } => {
                self.pending_timers.insert(
                    timer_id.clone(),
                    TimerInfo {
                        started_id: record.event_id,
                        fire_timestamp_ms: record.timestamp_ms,
                    },
                );
            }

            HistoryEvent::TimerFired { timer_id, .. } | HistoryEvent::TimerCanceled { timer_id, .. } => {
                if self.pending_timers.remove(timer_id).is_none() {
                    return Err(HistoryError::bad_request(format!(
                        "timer {timer_id} is not pending"
                    )));
                }
            }

            HistoryEvent::MarkerRecorded { .. } => {}

            HistoryEvent::StartChildWorkflowExecutionInitiated { .. } => {
                self.pending_children.insert(
                    record.event_id,
                    ChildInfo { initiated_id: record.event_id, started: false },
                );
            }

            HistoryEvent::ChildWorkflowExecutionStarted { initiated_event_id, .. } => {
                let child = self
                    .pending_children
                    .get_mut(initiated_event_id)
                    .ok_or_else(|| HistoryError::bad_request("no pending child for initiated id"))?;
                child.started = true;
            }

            HistoryEvent::RequestCancelExternalWorkflowExecutionInitiated { .. } => {
                self.pending_request_cancels.insert(
                    record.event_id,
                    RequestCancelInfo { initiated_id: record.event_id },
                );
            }

            HistoryEvent::ExternalWorkflowExecutionCancelRequested { initiated_event_id } => {
                self.pending_request_cancels.remove(initiated_event_id);
            }

            HistoryEvent::SignalExternalWorkflowExecutionInitiated { signal_name, .. } => {
                self.pending_signals.insert(
                    record.event_id,
                    SignalInfo { initiated_id: record.event_id, signal_name: signal_name.clone() },
                );
            }

            HistoryEvent::ExternalWorkflowExecutionSignaled { initiated_event_id } => {
                self.pending_signals.remove(initiated_event_id);
            }

            HistoryEvent::WorkflowExecutionCompleted { .. }
            | HistoryEvent::WorkflowExecutionFailed { .. }
            | HistoryEvent::WorkflowExecutionCanceled { .. }
            | HistoryEvent::WorkflowExecutionTerminated { .. }
            | HistoryEvent::WorkflowExecutionTimedOut
            | HistoryEvent::WorkflowExecutionContinuedAsNew { .. } => {
                self.execution_info.state = ExecutionState::Completed;
                self.execution_info.close_status = record.event.close_status();
            }

            HistoryEvent::Custom => {}
        }
        Ok(())
    }

    fn decision_mut(&mut self, scheduled_event_id: ScheduleId) -> HistoryResult<&mut DecisionInfo> {
        self.require_decision(scheduled_event_id)?;
        // require_decision just confirmed pending_decision is Some for this schedule id.
        #[allow(clippy::expect_used)]
        let decision = self.pending_decision.as_mut().expect("checked by require_decision");
        Ok(decision)
    }

    fn require_decision(&self, scheduled_event_id: ScheduleId) -> HistoryResult<()> {
        match &self.pending_decision {
            Some(decision) if decision.schedule_id == scheduled_event_id => Ok(()),
            _ => Err(HistoryError::bad_request("no matching pending decision task")),
        }
    }

    fn activity_mut(&mut self, schedule_id: ScheduleId) -> HistoryResult<&mut ActivityInfo> {
        self.pending_activities
            .get_mut(&schedule_id)
            .ok_or_else(|| HistoryError::bad_request("no pending activity for schedule id"))
    }

    fn require_activity(&self, schedule_id: ScheduleId) -> HistoryResult<()> {
        if self.pending_activities.contains_key(&schedule_id) {
            Ok(())
        } else {
            Err(HistoryError::bad_request("no pending activity for schedule id"))
        }
    }

    /// Timestamp a `WorkflowExecutionContinuedAsNew`'s initiator should be
    /// recorded as, given what closed the previous decision.
    pub fn continue_as_new_initiator(&self, retry_attempt: bool) -> ContinueAsNewInitiator {
        if retry_attempt {
            ContinueAsNewInitiator::RetryPolicy
        } else if self.execution_info.cron_schedule.is_some() {
            ContinueAsNewInitiator::CronSchedule
        } else {
            ContinueAsNewInitiator::Decider
        }
    }

    /// True once the workflow's execution start-to-close deadline has
    /// passed, given the current epoch-millisecond time.
    pub fn has_expired(&self, now_epoch_ms: i64) -> bool {
        match self.execution_info.workflow_expiration_timestamp_ms {
            Some(deadline) => now_epoch_ms >= deadline,
            None => false,
        }
    }

    /// Append a new auto-reset point after a decision-task completion,
    /// rotating out the oldest entry once `max_points` is reached (§4.3).
    pub fn push_auto_reset_point(&mut self, point: AutoResetPoint, max_points: usize) {
        let points = &mut self.execution_info.auto_reset_points;
        if max_points == 0 {
            return;
        }
        if points.len() >= max_points {
            points.remove(0);
        }
        points.push(point);
    }
}

fn is_decision_task_lifecycle_event(event: &HistoryEvent) -> bool {
    matches!(
        event,
        HistoryEvent::DecisionTaskStarted { .. }
            | HistoryEvent::DecisionTaskCompleted { .. }
            | HistoryEvent::DecisionTaskFailed { .. }
            | HistoryEvent::DecisionTaskTimedOut { .. }
    )
}

fn is_decision_closing_event(event: &HistoryEvent) -> bool {
    matches!(
        event,
        HistoryEvent::DecisionTaskCompleted { .. }
            | HistoryEvent::DecisionTaskFailed { .. }
            | HistoryEvent::DecisionTaskTimedOut { .. }
    )
}

#[cfg(test)]
#[path = "mutable_state_tests.rs"]
mod tests;
