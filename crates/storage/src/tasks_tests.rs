// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wfh_core::{DomainId, RunId, WorkflowId};

fn timer(fire_timestamp_ms: i64, task_id: i64) -> TimerTask {
    TimerTask {
        task_id,
        domain_id: DomainId::new("d"),
        workflow_id: WorkflowId::new("w"),
        run_id: RunId::new(),
        fire_timestamp_ms,
        kind: TimerTaskKind::RetentionDelete,
    }
}

#[yare::parameterized(
    earlier_fire_time_wins    = { timer(100, 9), timer(200, 1), true },
    later_fire_time_loses     = { timer(200, 1), timer(100, 9), false },
    tie_breaks_on_task_id     = { timer(100, 1), timer(100, 2), true },
    tie_reversed_loses        = { timer(100, 2), timer(100, 1), false },
    identical_keys_not_less   = { timer(100, 1), timer(100, 1), false },
)]
fn sort_key_orders_by_fire_time_then_task_id(a: TimerTask, b: TimerTask, a_before_b: bool) {
    assert_eq!(a.sort_key() < b.sort_key(), a_before_b);
}
