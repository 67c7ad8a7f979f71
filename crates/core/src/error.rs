// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy for the history engine.

use thiserror::Error;

/// All errors the engine can return to a caller, or use internally to drive
/// the OCC retry loop.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Validation failure. Not retried; surfaced verbatim.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The referenced entity does not exist, or the run has already
    /// completed. Final for the caller.
    #[error("entity not found: {0}")]
    EntityNotExists(String),

    /// A `StartWorkflow` or task-recording call raced a duplicate.
    /// Idempotency at the call site determines whether this is success.
    #[error("already started: {0}")]
    AlreadyStarted(String),

    /// Signals or buffered events exceeded a configured cap.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// This domain's active cluster is not the local cluster; retry at the
    /// active cluster.
    #[error("domain not active: {0}")]
    DomainNotActive(String),

    /// A write timed out. Treated as success for write-path idempotency
    /// purposes at the `StartWorkflow` call site (see DESIGN.md).
    #[error("timeout: {0}")]
    Timeout(String),

    /// Catch-all; safe for the client to retry.
    #[error("internal error: {0}")]
    Internal(String),

    /// The OCC loop ran `conditional_retry_count` times without success.
    #[error("max attempts exceeded")]
    MaxAttemptsExceeded,

    /// A mutation pushed the transaction past the configured size limit.
    /// The workflow is terminated with reason `TransactionSizeExceedsLimit`.
    #[error("transaction size limit exceeded")]
    TransactionSizeLimit,

    /// Internal-only: the loaded condition no longer matches storage.
    /// Never returned to an external caller.
    #[error("occ conflict")]
    Conflict,

    /// Internal-only: a mutation observed `scheduleID >= nextEventID` for a
    /// task it expected to be settled. Forces a cache clear and reload.
    #[error("stale state")]
    StaleState,
}

impl HistoryError {
    /// Whether the OCC loop should retry locally without surfacing this
    /// error to the caller.
    pub fn is_local_retry(&self) -> bool {
        matches!(self, HistoryError::Conflict | HistoryError::StaleState)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn entity_not_exists(msg: impl Into<String>) -> Self {
        Self::EntityNotExists(msg.into())
    }

    pub fn already_started(msg: impl Into<String>) -> Self {
        Self::AlreadyStarted(msg.into())
    }

    pub fn limit_exceeded(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
