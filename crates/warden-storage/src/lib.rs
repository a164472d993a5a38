//! warden-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for warden, including:
//! - RbacStore trait over the five RBAC relations
//! - In-memory implementation for tests and embedded use
//! - PostgreSQL implementation for production
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               warden-storage                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - RbacStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! │  postgres.rs - PostgreSQL implementation    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

// Re-export commonly used types
pub use error::{HealthStatus, PoolStats, StorageError, StorageResult};
pub use memory::MemoryRbacStore;
pub use postgres::{PostgresConfig, PostgresRbacStore};
pub use traits::{
    PermissionRecord, RbacStore, RolePermissionRow, RoleRecord, Subject, SubjectPermissionRow,
    SubjectRoleRow, TenantScope, DEFAULT_SUBJECT_KIND,
};
