//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Role referenced by id does not exist.
    #[error("role not found: {role_id}")]
    RoleNotFound { role_id: i64 },

    /// Permission referenced by id does not exist.
    #[error("permission not found: {permission_id}")]
    PermissionNotFound { permission_id: i64 },

    /// Database connection error.
    #[error("database connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Query exceeded its timeout.
    #[error("query timeout after {timeout:?} during {operation}")]
    QueryTimeout {
        operation: String,
        timeout: std::time::Duration,
    },

    /// Transaction error.
    #[error("transaction error: {message}")]
    TransactionError { message: String },

    /// Migration error.
    #[error("migration error: {message}")]
    MigrationError { message: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Health check failed.
    #[error("health check failed: {message}")]
    HealthCheckFailed { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Connection pool statistics reported by backends that pool connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub max_connections: u32,
}

/// Result of a backend health probe.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the backend answered the probe.
    pub healthy: bool,
    /// Round-trip latency of the probe.
    pub latency: std::time::Duration,
    /// Pool statistics, for backends that have a pool.
    pub pool_stats: Option<PoolStats>,
    /// Backend identifier or diagnostic detail.
    pub message: Option<String>,
}
