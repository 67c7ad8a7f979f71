// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambient counters for the OCC loop, decision processing, and timer
//! generation (§4.10). No external metrics backend: plain atomics, read by
//! tests and exposed for external scraping.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub occ_conflicts: AtomicU64,
    pub occ_retries_exhausted: AtomicU64,
    pub decisions_processed: AtomicU64,
    pub timers_fired: AtomicU64,
    pub decision_tasks_failed: AtomicU64,
    /// §4.3 completion-decision dedup: a completion-type decision arriving
    /// after the batch already closed the workflow (`MultipleCompletionDecisions`).
    pub multiple_completion_decisions: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_occ_conflict(&self) {
        self.occ_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_occ_retries_exhausted(&self) {
        self.occ_retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decisions_processed(&self, count: u64) {
        self.decisions_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_timer_fired(&self) {
        self.timers_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision_task_failed(&self) {
        self.decision_tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_multiple_completion_decisions(&self, count: u64) {
        self.multiple_completion_decisions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            occ_conflicts: self.occ_conflicts.load(Ordering::Relaxed),
            occ_retries_exhausted: self.occ_retries_exhausted.load(Ordering::Relaxed),
            decisions_processed: self.decisions_processed.load(Ordering::Relaxed),
            timers_fired: self.timers_fired.load(Ordering::Relaxed),
            decision_tasks_failed: self.decision_tasks_failed.load(Ordering::Relaxed),
            multiple_completion_decisions: self.multiple_completion_decisions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineMetricsSnapshot {
    pub occ_conflicts: u64,
    pub occ_retries_exhausted: u64,
    pub decisions_processed: u64,
    pub timers_fired: u64,
    pub decision_tasks_failed: u64,
    pub multiple_completion_decisions: u64,
}
