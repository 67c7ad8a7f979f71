// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn execution_identity_display_includes_all_three_parts() {
    let id = ExecutionIdentity::new(
        DomainId::new("acme"),
        WorkflowId::new("order-123"),
        RunId::from_string("run-abc"),
    );
    assert_eq!(id.to_string(), "acme/order-123/run-abc");
}

#[test]
fn workflow_id_allows_long_caller_supplied_strings() {
    let long = "order-".to_string() + &"9".repeat(200);
    let id = WorkflowId::new(&long);
    assert_eq!(id.as_str(), long);
}

#[test]
fn run_id_new_is_prefixed_and_unique() {
    let a = RunId::new();
    let b = RunId::new();
    assert!(a.as_str().starts_with(RunId::PREFIX));
    assert_ne!(a, b);
}
