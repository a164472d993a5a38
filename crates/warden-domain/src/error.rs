//! Domain error types for the RBAC engine.

use std::path::PathBuf;

use thiserror::Error;

use warden_storage::StorageError;

/// Errors surfaced by engine operations.
///
/// Missing roles or permissions are not errors: lookups return `None` and
/// checks return `false` for them. Everything here is an actual failure.
#[derive(Debug, Error)]
pub enum RbacError {
    /// Failure in the underlying store.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A snapshot file could not be read.
    #[error("failed to read snapshot file {}: {source}", .path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file held invalid JSON for the expected shape.
    #[error("failed to parse snapshot file {}: {source}", .path.display())]
    SnapshotParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for engine operations.
pub type RbacResult<T> = Result<T, RbacError>;
