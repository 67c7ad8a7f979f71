// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HistoryEventNotifier`: pub/sub of "new events appeared" signals, keyed
//! by execution identity, backing long-poll `GetMutableState` (§4.6, §9).
//!
//! Each key gets a `tokio::sync::watch` channel carrying the latest known
//! `next_event_id` (and close status). A waiter subscribes, then races the
//! channel against a timeout and the caller's own deadline with
//! `tokio::select!`.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::watch;
use wfh_core::{EventId, ExecutionIdentity};

/// The piece of state a waiter actually needs to know changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierState {
    pub next_event_id: EventId,
    pub is_closed: bool,
}

pub struct HistoryEventNotifier {
    channels: Mutex<HashMap<ExecutionIdentity, watch::Sender<NotifierState>>>,
}

impl Default for HistoryEventNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryEventNotifier {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()) }
    }

    /// Subscribe to future state changes for one execution. Returns a
    /// receiver a caller can poll via `changed()`/`borrow()`; the channel
    /// entry is created on first subscription and kept alive by the sender
    /// held here, so a subscriber that drops its receiver doesn't tear
    /// anything down.
    pub fn watch(&self, identity: &ExecutionIdentity, initial: NotifierState) -> watch::Receiver<NotifierState> {
        let mut channels = self.channels.lock();
        channels
            .entry(identity.clone())
            .or_insert_with(|| watch::channel(initial).0)
            .subscribe()
    }

    /// Notify subscribers that an execution's state advanced.
    pub fn notify(&self, identity: &ExecutionIdentity, state: NotifierState) {
        let channels = self.channels.lock();
        if let Some(sender) = channels.get(identity) {
            // No receivers is not an error; the notification is simply lost,
            // matching the best-effort semantics in §5.
            let _ = sender.send(state);
        }
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
