//! warden-domain: Core RBAC domain logic
//!
//! This crate contains the core authorization logic including:
//! - Role and permission catalog management
//! - Subject grants and effective permission checks
//! - Decision caching with TTL expiry
//! - Declarative state sync and export
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                warden-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  engine/  - Catalog, grants, checks, scope  │
//! │  cache/   - Permission decision caching     │
//! │  sync/    - Snapshot sync and export        │
//! │  access/  - Route gating helpers            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod cache;
pub mod engine;
pub mod error;
pub mod model;
pub mod sync;

// Re-export commonly used types at the crate root
pub use cache::{
    register_decision_cache_metrics, CacheMetrics, CacheMetricsSnapshot, DecisionCache,
    DecisionKey,
};
pub use engine::{EngineConfig, RbacEngine, ScopedEngine};
pub use error::{RbacError, RbacResult};
pub use model::{Permission, RbacSubject, Role, Subject, TenantScope, DEFAULT_GUARD};
pub use sync::{
    ExportFilter, MappingsFile, ModelPermissionSpec, ModelRoleSpec, PermissionSpec, RbacSnapshot,
    RolePermissionSpec, RoleSpec, SyncOptions, SyncReport,
};
