//! Result cache — last probe outcome per key with a fixed TTL.
//!
//! No eviction: an expired entry stays until the next completed probe
//! for the same key replaces it. Lookups simply ignore it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use super::ProbeResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ProbeResult,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct ResultCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Fresh result for `key`, if any. Fresh means `expires_at > now`.
    pub(crate) fn lookup(&self, key: &str, now: DateTime<Utc>) -> Option<ProbeResult> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.result.clone())
    }

    /// Insert or replace the entry for `key`, fresh until `now + ttl`.
    pub(crate) fn store(&mut self, key: String, result: ProbeResult, now: DateTime<Utc>) {
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(key, CacheEntry { result, expires_at });
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of slots, stale ones included.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }
}
