//! Prober — cached, coalesced bot connectivity checks.
//!
//! Flow for one `probe()` call:
//!
//!   config ─▶ cache key ─▶ result cache ──hit──▶ return
//!                              │ miss
//!                              ▼
//!                      in-flight registry ──pending──▶ await shared probe
//!                              │ absent
//!                              ▼
//!                    register + run executor ─▶ release slot, cache, return
//!
//! The cache check and the registry check-then-insert happen under one
//! lock with no await in between, so two callers racing on the same key
//! can never both start a network call.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::{ClientFactory, HttpClientFactory};
use crate::clock::{Clock, SystemClock};
use crate::config::{FeishuConfig, ProbeSettings};
use crate::credentials::{CredentialResolver, DefaultCredentialResolver};

mod cache;
mod executor;
mod inflight;
mod key;
mod result;

use cache::ResultCache;
use inflight::{InFlightRegistry, InFlightSlot, PendingProbe};

pub use executor::{ProbeExecutor, MISSING_CREDENTIALS};
pub use key::{cache_key, identity_key, NO_CREDENTIALS_KEY};
pub use result::{BotProfile, ProbeFailure, ProbeResult};

// ── Shared Tables ───────────────────────────────────────────────────

pub(crate) struct ProbeTables {
    pub(crate) cache: ResultCache,
    pub(crate) in_flight: InFlightRegistry,
}

impl ProbeTables {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            cache: ResultCache::new(ttl),
            in_flight: InFlightRegistry::default(),
        }
    }
}

/// Nothing panics while holding the table lock, but a poisoned lock
/// must not wedge every later probe either.
pub(crate) fn lock_tables(tables: &Mutex<ProbeTables>) -> MutexGuard<'_, ProbeTables> {
    tables.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time view of the prober's tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStats {
    /// Cache slots, stale ones included.
    pub cached_entries: usize,
    pub in_flight: usize,
    pub ttl: Duration,
}

// ── Prober ──────────────────────────────────────────────────────────

pub struct Prober {
    tables: Arc<Mutex<ProbeTables>>,
    resolver: Arc<dyn CredentialResolver>,
    executor: Arc<ProbeExecutor>,
    clock: Arc<dyn Clock>,
}

impl Prober {
    /// Production wiring: env-backed resolver, reqwest client, wall clock.
    pub fn new(settings: ProbeSettings) -> Self {
        Self::with_parts(
            Arc::new(DefaultCredentialResolver::new()),
            Arc::new(HttpClientFactory::new(settings.http_timeout)),
            Arc::new(SystemClock),
            settings.ttl,
        )
    }

    pub fn with_parts(
        resolver: Arc<dyn CredentialResolver>,
        factory: Arc<dyn ClientFactory>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            tables: Arc::new(Mutex::new(ProbeTables::new(ttl))),
            executor: Arc::new(ProbeExecutor::new(Arc::clone(&resolver), factory)),
            resolver,
            clock,
        }
    }

    /// Check connectivity for `config`, reusing a fresh cached result or
    /// joining a probe already running for the same app identity.
    pub async fn probe(&self, config: Option<&FeishuConfig>) -> ProbeResult {
        let key = cache_key(self.resolver.as_ref(), config);

        let pending = {
            let mut tables = lock_tables(&self.tables);
            if let Some(hit) = tables.cache.lookup(&key, self.clock.now()) {
                debug!(key = %key, ok = hit.is_ok(), "Feishu probe cache hit");
                return hit;
            }
            match tables.in_flight.get(&key) {
                Some(pending) => {
                    debug!(key = %key, "Joining in-flight Feishu probe");
                    pending
                }
                None => {
                    let id = tables.in_flight.next_id();
                    let pending = self.launch(key.clone(), id, config.cloned());
                    tables.in_flight.insert(key, id, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Drop every cached result and forget in-flight probes. Probes
    /// already running still deliver to their waiters but are not cached.
    pub fn reset(&self) {
        let drained = {
            let mut tables = lock_tables(&self.tables);
            tables.cache.clear();
            tables.in_flight.drain()
        };
        drop(drained);
    }

    pub fn stats(&self) -> ProbeStats {
        let tables = lock_tables(&self.tables);
        ProbeStats {
            cached_entries: tables.cache.len(),
            in_flight: tables.in_flight.len(),
            ttl: tables.cache.ttl(),
        }
    }

    /// Build the shared future for one physical probe attempt. The slot
    /// is created here, not on first poll, so a future drained by `reset`
    /// before it ever runs still releases it.
    fn launch(&self, key: String, id: u64, config: Option<FeishuConfig>) -> PendingProbe {
        let slot = InFlightSlot::new(Arc::downgrade(&self.tables), key.clone(), id);
        let executor = Arc::clone(&self.executor);
        let clock = Arc::clone(&self.clock);
        let span = info_span!("feishu_probe", attempt_id = %Uuid::new_v4(), key = %key);

        async move {
            let outcome = AssertUnwindSafe(executor.execute(config.as_ref()))
                .catch_unwind()
                .await;
            match outcome {
                Ok(result) => {
                    if !slot.complete(&result, clock.now()) {
                        debug!("Probe finished after reset; result not cached");
                    }
                    result
                }
                Err(panic) => {
                    drop(slot);
                    let reason = panic_message(panic.as_ref());
                    error!("Feishu probe aborted: {}", reason);
                    ProbeResult::failure(
                        executor.app_id(config.as_ref()),
                        format!("probe aborted: {}", reason),
                    )
                }
            }
        }
        .instrument(span)
        .boxed()
        .shared()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Process-wide Prober ─────────────────────────────────────────────

static GLOBAL: OnceLock<Prober> = OnceLock::new();

/// The process-wide prober, built from env settings on first use.
pub fn global() -> &'static Prober {
    GLOBAL.get_or_init(|| {
        let settings = ProbeSettings::from_env().unwrap_or_else(|e| {
            warn!("Invalid probe settings, using defaults: {}", e);
            ProbeSettings::default()
        });
        Prober::new(settings)
    })
}

/// Probe through the process-wide prober.
pub async fn probe_feishu(config: Option<&FeishuConfig>) -> ProbeResult {
    global().probe(config).await
}
