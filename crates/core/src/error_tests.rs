// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    bad_request         = { HistoryError::bad_request("x"),       false },
    entity_not_exists    = { HistoryError::entity_not_exists("x"), false },
    already_started      = { HistoryError::already_started("x"),   false },
    limit_exceeded       = { HistoryError::limit_exceeded("x"),    false },
    domain_not_active    = { HistoryError::DomainNotActive("x".into()), false },
    timeout              = { HistoryError::timeout("x"),           false },
    internal             = { HistoryError::Internal("x".into()),   false },
    max_attempts         = { HistoryError::MaxAttemptsExceeded,    false },
    transaction_size     = { HistoryError::TransactionSizeLimit,   false },
    conflict             = { HistoryError::Conflict,               true },
    stale_state          = { HistoryError::StaleState,             true },
)]
fn is_local_retry_iff_conflict_or_stale(err: HistoryError, expected: bool) {
    assert_eq!(err.is_local_retry(), expected);
}

#[test]
fn constructors_carry_message() {
    let err = HistoryError::entity_not_exists("workflow completed");
    assert_eq!(err.to_string(), "entity not found: workflow completed");
}
