// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ExecutionCache` / `ExecutionContext` (§4.1): a bounded keyed cache
//! mapping `{domainID, workflowID, runID}` to a lease-guarded
//! `MutableState`, serializing mutation per execution.
//!
//! Grounded on the same pattern as `alfredjeanlab-oddjobs`'s
//! `Runtime`-held `Arc<Mutex<MaterializedState>>`: one lock per unit of
//! concurrency, generalized here to one lock *per execution* instead of
//! one lock for the whole shard, plus LRU capacity eviction.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use wfh_core::{ExecutionIdentity, HistoryError, HistoryResult, MutableState};

type Slot = Arc<AsyncMutex<Option<MutableState>>>;

/// A held exclusive lease on one execution's cache slot. Dropping it
/// releases the lease; call [`ExecutionLease::clear`] first if the held
/// state should be invalidated (forcing the next acquire to reload).
pub struct ExecutionLease {
    identity: ExecutionIdentity,
    guard: OwnedMutexGuard<Option<MutableState>>,
}

impl ExecutionLease {
    pub fn identity(&self) -> &ExecutionIdentity {
        &self.identity
    }

    pub fn get(&self) -> Option<&MutableState> {
        self.guard.as_ref()
    }

    pub fn set(&mut self, state: MutableState) {
        *self.guard = Some(state);
    }

    /// Invalidate the cached state so the next `acquire` for this identity
    /// reloads from persistence (§4.2 step 6, on conflict or error).
    pub fn clear(&mut self) {
        *self.guard = None;
    }
}

pub struct ExecutionCache {
    capacity: usize,
    entries: Mutex<IndexMap<ExecutionIdentity, Slot>>,
}

impl ExecutionCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: Mutex::new(IndexMap::new()) }
    }

    fn slot_for(&self, identity: &ExecutionIdentity) -> Slot {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(identity) {
            let slot = existing.clone();
            #[allow(clippy::expect_used)]
            let index = entries.get_index_of(identity).expect("just looked up");
            entries.move_index(index, entries.len().saturating_sub(1));
            return slot;
        }
        let slot: Slot = Arc::new(AsyncMutex::new(None));
        entries.insert(identity.clone(), slot.clone());
        self.evict_idle_over_capacity(&mut entries);
        slot
    }

    /// Drop idle (not currently leased) entries from the front of the
    /// ordering until at or under capacity. In-use entries are skipped and
    /// never evicted (§4.1).
    fn evict_idle_over_capacity(&self, entries: &mut IndexMap<ExecutionIdentity, Slot>) {
        while entries.len() > self.capacity {
            let idle_key = entries
                .iter()
                .find(|(_, slot)| slot.try_lock().is_ok())
                .map(|(key, _)| key.clone());
            match idle_key {
                Some(key) => {
                    entries.shift_remove(&key);
                }
                None => break,
            }
        }
    }

    /// Acquire exclusive access to one execution, waiting on the lease if
    /// another caller holds it, bounded by `deadline` (§4.1).
    pub async fn acquire(&self, identity: &ExecutionIdentity, deadline: Duration) -> HistoryResult<ExecutionLease> {
        let slot = self.slot_for(identity);
        let guard = tokio::time::timeout(deadline, slot.lock_owned())
            .await
            .map_err(|_| HistoryError::timeout(format!("lease acquire for {identity} timed out")))?;
        Ok(ExecutionLease { identity: identity.clone(), guard })
    }

    /// §4.1 `getAndCreate`: like `acquire`, but always reloads via `loader`
    /// and hands back both the cache hit observed before reload (`None` on
    /// a cold slot) and the freshly-loaded view, for a caller doing
    /// diagnostics rather than a normal mutation. The returned lease ends
    /// up holding the freshly-loaded state, same as any other acquire.
    pub async fn get_and_create<F, Fut>(
        &self,
        identity: &ExecutionIdentity,
        deadline: Duration,
        loader: F,
    ) -> HistoryResult<GetAndCreate>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = HistoryResult<MutableState>>,
    {
        let mut lease = self.acquire(identity, deadline).await?;
        let cache_hit = lease.get().cloned();
        let fresh = loader().await?;
        lease.set(fresh.clone());
        Ok(GetAndCreate { cache_hit, fresh, lease })
    }
}

/// Result of [`ExecutionCache::get_and_create`]: the entry as found in
/// cache before reload (if any), the freshly-loaded view that replaced it,
/// and the lease now holding that freshly-loaded view.
pub struct GetAndCreate {
    pub cache_hit: Option<MutableState>,
    pub fresh: MutableState,
    pub lease: ExecutionLease,
}

#[cfg(test)]
#[path = "execution_cache_tests.rs"]
mod tests;
