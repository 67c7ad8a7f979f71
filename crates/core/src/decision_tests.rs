// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn close_decisions_are_flagged() {
    assert!(Decision::CompleteWorkflowExecution { result: "ok".into() }.is_close_decision());
    assert!(!Decision::RecordMarker { marker_name: "m".into(), details: "".into() }
        .is_close_decision());
}

#[test]
fn serde_tag_matches_name() {
    let decision = Decision::StartTimer {
        timer_id: UserTimerId::new("t1"),
        start_to_fire_timeout_ms: 1000,
    };
    let json = serde_json::to_value(&decision).unwrap();
    assert_eq!(json["decisionType"], decision.name());
}
