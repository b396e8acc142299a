//! In-flight registry — collapses concurrent probes for one key into a
//! single network call.
//!
//! Each entry is a shared future; every caller that misses the cache
//! while a probe for its key is running awaits the same future and gets
//! the same result. Entries are tagged with a generation id so a probe
//! that finishes after a `reset()` cannot remove (or cache over) a newer
//! probe for the same key.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Mutex, Weak};

use super::{lock_tables, ProbeResult, ProbeTables};

pub(crate) type PendingProbe = Shared<BoxFuture<'static, ProbeResult>>;

struct InFlightEntry {
    id: u64,
    pending: PendingProbe,
}

#[derive(Default)]
pub(crate) struct InFlightRegistry {
    entries: HashMap<String, InFlightEntry>,
    next_id: u64,
}

impl InFlightRegistry {
    pub(crate) fn get(&self, key: &str) -> Option<PendingProbe> {
        self.entries.get(key).map(|entry| entry.pending.clone())
    }

    /// Hand out a generation id for a probe about to be registered.
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn insert(&mut self, key: String, id: u64, pending: PendingProbe) {
        self.entries.insert(key, InFlightEntry { id, pending });
    }

    /// Remove the entry for `key` only if it still belongs to probe `id`.
    /// The removed future is returned so the caller can drop it after
    /// releasing the table lock.
    pub(crate) fn release(&mut self, key: &str, id: u64) -> Option<PendingProbe> {
        match self.entries.get(key) {
            Some(entry) if entry.id == id => self.entries.remove(key).map(|e| e.pending),
            _ => None,
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<PendingProbe> {
        self.entries.drain().map(|(_, e)| e.pending).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Ownership of one registry slot for the lifetime of a probe.
///
/// `complete` releases the slot and caches the result in one critical
/// section. If the slot is dropped without completing (panic, or the
/// probe future itself being dropped), `Drop` releases it anyway.
///
/// The tables own the pending future that owns this slot, so the slot
/// only holds a weak handle. Once the prober is gone there is nothing
/// left to release.
pub(crate) struct InFlightSlot {
    tables: Weak<Mutex<ProbeTables>>,
    key: String,
    id: u64,
    released: bool,
}

impl InFlightSlot {
    pub(crate) fn new(tables: Weak<Mutex<ProbeTables>>, key: String, id: u64) -> Self {
        Self {
            tables,
            key,
            id,
            released: false,
        }
    }

    /// Release the slot and cache `result`. Returns false when the slot
    /// had already been superseded, in which case nothing is cached.
    pub(crate) fn complete(mut self, result: &ProbeResult, now: DateTime<Utc>) -> bool {
        self.released = true;
        let Some(tables) = self.tables.upgrade() else {
            return false;
        };
        let removed = {
            let mut tables = lock_tables(&tables);
            let removed = tables.in_flight.release(&self.key, self.id);
            if removed.is_some() {
                tables.cache.store(self.key.clone(), result.clone(), now);
            }
            removed
        };
        removed.is_some()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(tables) = self.tables.upgrade() {
            let removed = lock_tables(&tables).in_flight.release(&self.key, self.id);
            drop(removed);
        }
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.release();
    }
}
