//! The RBAC engine: catalog, grants, checks and cache control.
//!
//! [`RbacEngine`] is generic over the storage backend and owns the decision
//! cache plus the runtime-settable super admin role. Operations are grouped
//! by concern:
//!
//! - catalog: find / find-or-create for roles and permissions
//! - grants: attach, detach and replace edges (each flushes the cache)
//! - checks: has-role / has-permission combinators, `can` and `authorize`
//!
//! Bulk snapshot reconciliation lives in [`crate::sync`] and is implemented
//! on the same engine. [`ScopedEngine`] binds a tenant scope lexically so
//! call sites working inside one tenant do not repeat it.

mod catalog;
mod checks;
mod grants;
mod scoped;

pub use scoped::ScopedEngine;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use warden_storage::{RbacStore, TenantScope};

use crate::cache::{CacheMetrics, DecisionCache};
use crate::model::DEFAULT_GUARD;

/// Configuration applied when constructing an [`RbacEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Guard name callers should fall back to when none is chosen.
    pub default_guard: String,
    /// Role name that makes `authorize` short-circuit to true.
    /// `None` disables the bypass.
    pub super_admin_role: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_guard: DEFAULT_GUARD.to_string(),
            super_admin_role: None,
        }
    }
}

impl EngineConfig {
    /// Sets the default guard.
    pub fn with_default_guard(mut self, guard: impl Into<String>) -> Self {
        self.default_guard = guard.into();
        self
    }

    /// Sets the super admin role name.
    pub fn with_super_admin_role(mut self, role: impl Into<String>) -> Self {
        self.super_admin_role = Some(role.into());
        self
    }
}

/// The authorization engine.
///
/// Wraps an [`RbacStore`] with find-or-create catalog semantics, idempotent
/// grant management, permission checks layered over a TTL decision cache,
/// and bulk snapshot synchronization.
///
/// The engine takes no locks around store calls; it is safe for concurrent
/// use to the extent the backend is. Share it behind an `Arc` rather than
/// cloning.
pub struct RbacEngine<S> {
    pub(crate) store: Arc<S>,
    pub(crate) cache: DecisionCache,
    default_guard: String,
    super_admin_role: RwLock<Option<String>>,
}

impl<S: RbacStore> RbacEngine<S> {
    /// Creates an engine with the default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            cache: DecisionCache::new(),
            default_guard: config.default_guard,
            super_admin_role: RwLock::new(config.super_admin_role),
        }
    }

    /// The storage backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Guard name callers should fall back to.
    pub fn default_guard(&self) -> &str {
        &self.default_guard
    }

    /// Replaces the super admin role name. `None` disables the bypass.
    pub async fn set_super_admin_role(&self, role: Option<String>) {
        *self.super_admin_role.write().await = role;
    }

    /// The currently configured super admin role name.
    pub async fn super_admin_role(&self) -> Option<String> {
        self.super_admin_role.read().await.clone()
    }

    /// Turns the decision cache on with the given TTL.
    pub fn enable_cache(&self, ttl: Duration) {
        self.cache.enable(ttl);
    }

    /// Turns the decision cache off and clears it.
    pub fn disable_cache(&self) {
        self.cache.disable();
    }

    /// Whether the decision cache is currently consulted.
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    /// Counters for decision cache monitoring.
    pub fn cache_metrics(&self) -> &CacheMetrics {
        self.cache.metrics()
    }

    /// Binds `scope` lexically, yielding a view whose scope-aware calls all
    /// use it.
    pub fn scoped(&self, scope: TenantScope) -> ScopedEngine<'_, S> {
        ScopedEngine::new(self, scope)
    }
}
