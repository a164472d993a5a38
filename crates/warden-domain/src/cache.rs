//! Permission decision caching with TTL expiry and coarse invalidation.
//!
//! The cache maps a full decision identity (subject, permission, guard,
//! tenant scope) to the boolean outcome of an effective-permission check.
//! All entries share one TTL, fixed when the cache is enabled. Expired
//! entries are dropped lazily on access; there is no background sweep.
//! Mutations do not invalidate selectively: every write to the RBAC graph
//! flushes the whole cache.
//!
//! # Cache Safety
//!
//! Caching is **disabled** by default. Within one process, mutations flush
//! the cache, so a stale decision can only be observed when the underlying
//! store is written from elsewhere (another process instance, or direct
//! store access). That staleness window is bounded by the TTL.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use warden_domain::cache::{DecisionCache, DecisionKey};
//! use warden_domain::{Subject, TenantScope};
//!
//! let cache = DecisionCache::new();
//! cache.enable(Duration::from_secs(1));
//!
//! let key = DecisionKey::new(&Subject::user(1), "edit", "web", &TenantScope::global());
//! cache.insert(key.clone(), true);
//! assert_eq!(cache.get(&key), Some(true));
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use warden_storage::{Subject, TenantScope};

/// Uniquely identifies one effective-permission decision.
///
/// The key carries the subject, permission name, guard and tenant scope, so
/// the same permission checked under another guard or tenant caches
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub subject_kind: String,
    pub subject_id: i64,
    pub permission: String,
    pub guard: String,
    pub roleable_id: Option<i64>,
    pub roleable_type: Option<String>,
}

impl DecisionKey {
    /// Builds the key for a subject/permission/guard/scope combination.
    pub fn new(subject: &Subject, permission: &str, guard: &str, scope: &TenantScope) -> Self {
        Self {
            subject_kind: subject.kind.clone(),
            subject_id: subject.id,
            permission: permission.to_string(),
            guard: guard.to_string(),
            roleable_id: scope.roleable_id,
            roleable_type: scope.roleable_type.clone(),
        }
    }
}

/// Counters for decision cache monitoring.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Lookups answered from the cache.
    pub hits: AtomicU64,
    /// Lookups that fell through to the store (absent or expired entry).
    pub misses: AtomicU64,
    /// Lookups made while the cache was disabled.
    pub skips: AtomicU64,
    /// Whole-cache flushes triggered by mutations.
    pub flushes: AtomicU64,
}

impl CacheMetrics {
    /// Returns a snapshot of the current counters.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            skips: self.skips.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Returns the cache hit ratio (hits / (hits + misses)).
    /// Returns 0.0 if no hits or misses have occurred.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// A point-in-time snapshot of cache counters.
#[derive(Debug, Clone, Copy)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub skips: u64,
    pub flushes: u64,
}

#[derive(Debug, Clone, Copy)]
struct CachedDecision {
    allowed: bool,
    expires_at: Instant,
}

/// TTL decision cache shared by every check the engine answers.
///
/// Thread-safe; enable/disable and TTL are runtime state, not construction
/// state, so one long-lived engine can turn caching on and off.
pub struct DecisionCache {
    entries: DashMap<DecisionKey, CachedDecision>,
    enabled: AtomicBool,
    ttl_millis: AtomicU64,
    metrics: CacheMetrics,
}

impl std::fmt::Debug for DecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCache")
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.ttl())
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

impl DecisionCache {
    /// Creates a disabled cache. Call [`enable`](Self::enable) to turn it on.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            enabled: AtomicBool::new(false),
            ttl_millis: AtomicU64::new(0),
            metrics: CacheMetrics::default(),
        }
    }

    /// Turns caching on with one TTL for every entry.
    ///
    /// Existing entries are dropped first so entries never mix TTLs.
    pub fn enable(&self, ttl: Duration) {
        self.ttl_millis
            .store(ttl.as_millis() as u64, Ordering::Relaxed);
        self.entries.clear();
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Turns caching off and clears it.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        self.entries.clear();
    }

    /// Whether lookups currently consult the cache.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// The TTL entries are inserted with. Zero when never enabled.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis.load(Ordering::Relaxed))
    }

    /// Looks up a cached decision.
    ///
    /// Returns `None` when the cache is disabled, the key is absent, or the
    /// entry has expired. An expired entry is removed on the way out.
    ///
    /// # Metrics
    ///
    /// Increments `warden_cache_hits_total` on a hit and
    /// `warden_cache_misses_total` on a miss. A disabled cache counts a
    /// skip and emits nothing.
    pub fn get(&self, key: &DecisionKey) -> Option<bool> {
        if !self.is_enabled() {
            self.metrics.skips.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Copy the entry out so no shard guard is held across the removal.
        let decision = self.entries.get(key).map(|entry| *entry.value());
        match decision {
            Some(decision) if decision.expires_at > Instant::now() => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("warden_cache_hits_total").increment(1);
                Some(decision.allowed)
            }
            Some(_) => {
                self.entries
                    .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("warden_cache_misses_total").increment(1);
                None
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("warden_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Stores a decision with the configured TTL. No-op while disabled.
    pub fn insert(&self, key: DecisionKey, allowed: bool) {
        if !self.is_enabled() {
            return;
        }
        let expires_at = Instant::now() + self.ttl();
        self.entries.insert(key, CachedDecision { allowed, expires_at });
    }

    /// Drops every entry.
    ///
    /// Every mutating engine operation ends with a flush; there is no
    /// selective invalidation.
    pub fn flush(&self) {
        self.entries.clear();
        self.metrics.flushes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("warden_cache_flushes_total").increment(1);
    }

    /// Number of stored entries, counting expired ones not yet swept.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Counters for monitoring.
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers decision cache metrics descriptions.
///
/// Call once during application startup to register metric descriptions
/// with the metrics recorder. Optional, but gives dashboards readable help
/// text.
pub fn register_decision_cache_metrics() {
    metrics::describe_counter!(
        "warden_cache_hits_total",
        "Total number of decision cache hits"
    );
    metrics::describe_counter!(
        "warden_cache_misses_total",
        "Total number of decision cache misses"
    );
    metrics::describe_counter!(
        "warden_cache_flushes_total",
        "Total number of whole-cache flushes"
    );
}
