//! RbacStore trait definition and shared record types.

use async_trait::async_trait;

use crate::error::{HealthStatus, StorageError, StorageResult};

/// Maximum length accepted for names, guards, kinds and scope type strings.
/// Matches the VARCHAR(255) columns in the relational backends.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Subject kind used when callers do not specify one.
pub const DEFAULT_SUBJECT_KIND: &str = "user";

/// The entity being granted roles or permissions, identified by a kind
/// discriminator plus a numeric id (a polymorphic reference: the kind names
/// an application table, the id a row in it).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    /// Application-defined kind, e.g. "user" or "admin".
    pub kind: String,
    /// Row id within the kind's table.
    pub id: i64,
}

impl Subject {
    /// Creates a subject of an arbitrary kind.
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Creates a subject of the default kind.
    pub fn user(id: i64) -> Self {
        Self::new(DEFAULT_SUBJECT_KIND, id)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Optional tenant partition for roles: a polymorphic `(type, id)` pair
/// naming the owning entity (e.g. an organization). The default value is the
/// global partition; lookups match the scope fields exactly, so a global
/// lookup never sees tenant-scoped rows and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TenantScope {
    pub roleable_id: Option<i64>,
    pub roleable_type: Option<String>,
}

impl TenantScope {
    /// The global (untenanted) partition.
    pub fn global() -> Self {
        Self::default()
    }

    /// A scope owned by the given entity.
    pub fn of(roleable_type: impl Into<String>, roleable_id: i64) -> Self {
        Self {
            roleable_id: Some(roleable_id),
            roleable_type: Some(roleable_type.into()),
        }
    }

    /// True when both scope fields are unset.
    pub fn is_global(&self) -> bool {
        self.roleable_id.is_none() && self.roleable_type.is_none()
    }
}

/// A persisted role. Identity is the full
/// `(name, guard_name, roleable_id, roleable_type)` tuple; the id is a
/// store-assigned surrogate key used by the edge tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub guard_name: String,
    pub roleable_id: Option<i64>,
    pub roleable_type: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl RoleRecord {
    /// The tenant partition this role belongs to.
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            roleable_id: self.roleable_id,
            roleable_type: self.roleable_type.clone(),
        }
    }
}

/// A persisted permission. Identity is `(name, guard_name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecord {
    pub id: i64,
    pub name: String,
    pub guard_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A role↔permission edge joined with both endpoints, as returned by the
/// full-table listing used for export and prune computation.
#[derive(Debug, Clone)]
pub struct RolePermissionRow {
    pub role: RoleRecord,
    pub permission: PermissionRecord,
}

/// A subject↔role edge joined with the role endpoint.
#[derive(Debug, Clone)]
pub struct SubjectRoleRow {
    pub subject: Subject,
    pub role: RoleRecord,
}

/// A subject↔permission edge (direct grant) joined with the permission.
#[derive(Debug, Clone)]
pub struct SubjectPermissionRow {
    pub subject: Subject,
    pub permission: PermissionRecord,
}

fn validate_identifier(what: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{what} must not be empty"),
        });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(StorageError::InvalidInput {
            message: format!(
                "{what} exceeds maximum length of {MAX_IDENTIFIER_LEN} (actual: {})",
                value.len()
            ),
        });
    }
    Ok(())
}

/// Validates a role or permission name.
pub fn validate_name(name: &str) -> StorageResult<()> {
    validate_identifier("name", name)
}

/// Validates a guard name.
pub fn validate_guard(guard: &str) -> StorageResult<()> {
    validate_identifier("guard name", guard)
}

/// Validates a subject reference.
pub fn validate_subject(subject: &Subject) -> StorageResult<()> {
    validate_identifier("subject kind", &subject.kind)
}

/// Validates a tenant scope. Both fields must be set together or not at all;
/// a half-specified scope cannot identify a partition.
pub fn validate_scope(scope: &TenantScope) -> StorageResult<()> {
    match (&scope.roleable_id, &scope.roleable_type) {
        (None, None) => Ok(()),
        (Some(_), Some(ty)) => validate_identifier("roleable type", ty),
        _ => Err(StorageError::InvalidInput {
            message: "tenant scope must set both roleable_id and roleable_type, or neither"
                .to_string(),
        }),
    }
}

/// Abstract storage interface for RBAC data.
///
/// Covers the five relations (roles, permissions, role↔permission,
/// subject↔role, subject↔permission). Implementations must be thread-safe
/// (Send + Sync) and support concurrent callers; `find_or_create_*` must be
/// atomic with respect to concurrent calls for the same identity, and the
/// `replace_*` operations must apply their delete + upsert steps atomically.
///
/// Edge operations are idempotent sets: attaching an existing edge or
/// detaching a missing one is a no-op, not an error. Deleting a role or
/// permission also deletes its edges.
#[async_trait]
pub trait RbacStore: Send + Sync + 'static {
    // Role catalog

    /// Finds a role by its full identity. Returns None when absent.
    async fn find_role(
        &self,
        name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> StorageResult<Option<RoleRecord>>;

    /// Finds a role by identity, creating it when absent.
    async fn find_or_create_role(
        &self,
        name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> StorageResult<RoleRecord>;

    /// Finds all roles whose name is in `names` within the guard and scope.
    /// Missing names are simply absent from the result.
    async fn find_roles_by_names(
        &self,
        names: &[String],
        guard: &str,
        scope: &TenantScope,
    ) -> StorageResult<Vec<RoleRecord>>;

    /// Lists every role.
    async fn list_roles(&self) -> StorageResult<Vec<RoleRecord>>;

    /// Deletes the roles with the given ids along with their edges.
    /// Returns the number of roles deleted; unknown ids are skipped.
    async fn delete_roles(&self, ids: &[i64]) -> StorageResult<u64>;

    // Permission catalog

    /// Finds a permission by `(name, guard)`. Returns None when absent.
    async fn find_permission(
        &self,
        name: &str,
        guard: &str,
    ) -> StorageResult<Option<PermissionRecord>>;

    /// Finds a permission, creating it when absent.
    async fn find_or_create_permission(
        &self,
        name: &str,
        guard: &str,
    ) -> StorageResult<PermissionRecord>;

    /// Finds all permissions whose name is in `names` within the guard.
    async fn find_permissions_by_names(
        &self,
        names: &[String],
        guard: &str,
    ) -> StorageResult<Vec<PermissionRecord>>;

    /// Lists every permission.
    async fn list_permissions(&self) -> StorageResult<Vec<PermissionRecord>>;

    /// Deletes the permissions with the given ids along with their edges.
    async fn delete_permissions(&self, ids: &[i64]) -> StorageResult<u64>;

    // Role ↔ permission edges

    /// Attaches a permission to a role (no-op when already attached).
    async fn attach_permission_to_role(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StorageResult<()>;

    /// Detaches a permission from a role (no-op when not attached).
    async fn detach_permission_from_role(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StorageResult<()>;

    /// Atomically replaces the role's permission edge set with exactly
    /// `permission_ids`.
    async fn replace_role_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> StorageResult<()>;

    /// True when any role in `role_ids` has the permission attached.
    async fn any_role_has_permission(
        &self,
        role_ids: &[i64],
        permission_id: i64,
    ) -> StorageResult<bool>;

    /// Lists every role↔permission edge joined with its endpoints.
    async fn list_role_permissions(&self) -> StorageResult<Vec<RolePermissionRow>>;

    // Subject ↔ role edges

    /// Attaches a role to a subject (no-op when already attached).
    async fn attach_role_to_subject(&self, subject: &Subject, role_id: i64) -> StorageResult<()>;

    /// Detaches a role from a subject (no-op when not attached).
    async fn detach_role_from_subject(&self, subject: &Subject, role_id: i64)
        -> StorageResult<()>;

    /// Atomically replaces the subject's role edge set with exactly `role_ids`.
    async fn replace_subject_roles(&self, subject: &Subject, role_ids: &[i64])
        -> StorageResult<()>;

    /// True when the subject has the role attached.
    async fn subject_has_role(&self, subject: &Subject, role_id: i64) -> StorageResult<bool>;

    /// All role ids attached to the subject, across every guard and scope.
    async fn role_ids_for_subject(&self, subject: &Subject) -> StorageResult<Vec<i64>>;

    /// Lists every subject↔role edge joined with the role.
    async fn list_subject_roles(&self) -> StorageResult<Vec<SubjectRoleRow>>;

    // Subject ↔ permission edges (direct grants)

    /// Grants a permission directly to a subject (no-op when already granted).
    async fn attach_permission_to_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> StorageResult<()>;

    /// Revokes a direct grant (no-op when not granted).
    async fn detach_permission_from_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> StorageResult<()>;

    /// Atomically replaces the subject's direct-grant edge set with exactly
    /// `permission_ids`.
    async fn replace_subject_permissions(
        &self,
        subject: &Subject,
        permission_ids: &[i64],
    ) -> StorageResult<()>;

    /// True when the subject holds the permission by direct grant.
    async fn subject_has_permission(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> StorageResult<bool>;

    /// Lists every subject↔permission edge joined with the permission.
    async fn list_subject_permissions(&self) -> StorageResult<Vec<SubjectPermissionRow>>;

    // Health

    /// Probes the backend and reports its status.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
