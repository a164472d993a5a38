//! In-memory storage implementation.
//!
//! Backs tests, the CLI's memory mode, and embedded single-process use.
//! Catalog rows live in id-keyed `DashMap`s with identity-keyed index maps
//! alongside; edges are `HashSet<i64>` sets so attach/detach are O(1) and
//! naturally idempotent.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::traits::{
    validate_guard, validate_name, validate_scope, validate_subject, PermissionRecord, RbacStore,
    RolePermissionRow, RoleRecord, Subject, SubjectPermissionRow, SubjectRoleRow, TenantScope,
};

/// Full role identity, used as the index key for atomic find-or-create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RoleKey {
    name: String,
    guard_name: String,
    roleable_id: Option<i64>,
    roleable_type: Option<String>,
}

impl RoleKey {
    fn new(name: &str, guard: &str, scope: &TenantScope) -> Self {
        Self {
            name: name.to_string(),
            guard_name: guard.to_string(),
            roleable_id: scope.roleable_id,
            roleable_type: scope.roleable_type.clone(),
        }
    }

    fn of_record(record: &RoleRecord) -> Self {
        Self {
            name: record.name.clone(),
            guard_name: record.guard_name.clone(),
            roleable_id: record.roleable_id,
            roleable_type: record.roleable_type.clone(),
        }
    }
}

/// Permission identity index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PermissionKey {
    name: String,
    guard_name: String,
}

impl PermissionKey {
    fn new(name: &str, guard: &str) -> Self {
        Self {
            name: name.to_string(),
            guard_name: guard.to_string(),
        }
    }
}

/// In-memory implementation of RbacStore.
///
/// Uses DashMap for thread-safe concurrent access without a global lock.
/// Find-or-create goes through the identity index's entry API, so concurrent
/// calls for the same identity serialize on the index shard and cannot
/// create duplicates.
#[derive(Debug, Default)]
pub struct MemoryRbacStore {
    roles: DashMap<i64, RoleRecord>,
    role_ids: DashMap<RoleKey, i64>,
    permissions: DashMap<i64, PermissionRecord>,
    permission_ids: DashMap<PermissionKey, i64>,
    /// role_id -> attached permission ids.
    role_permissions: DashMap<i64, HashSet<i64>>,
    /// subject -> attached role ids.
    subject_roles: DashMap<Subject, HashSet<i64>>,
    /// subject -> directly granted permission ids.
    subject_permissions: DashMap<Subject, HashSet<i64>>,
    next_role_id: AtomicI64,
    next_permission_id: AtomicI64,
}

impl MemoryRbacStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn role_by_id(&self, id: i64) -> StorageResult<RoleRecord> {
        self.roles
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::RoleNotFound { role_id: id })
    }

    fn permission_by_id(&self, id: i64) -> StorageResult<PermissionRecord> {
        self.permissions
            .get(&id)
            .map(|p| p.value().clone())
            .ok_or(StorageError::PermissionNotFound { permission_id: id })
    }
}

#[async_trait]
impl RbacStore for MemoryRbacStore {
    async fn find_role(
        &self,
        name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> StorageResult<Option<RoleRecord>> {
        validate_name(name)?;
        validate_guard(guard)?;
        validate_scope(scope)?;

        let key = RoleKey::new(name, guard, scope);
        let id = match self.role_ids.get(&key) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        Ok(self.roles.get(&id).map(|r| r.value().clone()))
    }

    #[instrument(skip(self))]
    async fn find_or_create_role(
        &self,
        name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> StorageResult<RoleRecord> {
        validate_name(name)?;
        validate_guard(guard)?;
        validate_scope(scope)?;

        // The entry holds the index shard lock, so two concurrent creates for
        // the same identity cannot both take the vacant arm.
        use dashmap::mapref::entry::Entry;
        match self.role_ids.entry(RoleKey::new(name, guard, scope)) {
            Entry::Occupied(entry) => self.role_by_id(*entry.get()),
            Entry::Vacant(entry) => {
                let id = self.next_role_id.fetch_add(1, Ordering::Relaxed) + 1;
                let record = RoleRecord {
                    id,
                    name: name.to_string(),
                    guard_name: guard.to_string(),
                    roleable_id: scope.roleable_id,
                    roleable_type: scope.roleable_type.clone(),
                    created_at: chrono::Utc::now(),
                };
                // Record first, then index: a reader that finds the index
                // entry must always find the record.
                self.roles.insert(id, record.clone());
                entry.insert(id);
                Ok(record)
            }
        }
    }

    async fn find_roles_by_names(
        &self,
        names: &[String],
        guard: &str,
        scope: &TenantScope,
    ) -> StorageResult<Vec<RoleRecord>> {
        validate_guard(guard)?;
        validate_scope(scope)?;

        let mut found = Vec::new();
        for name in names {
            if let Some(role) = self.find_role(name, guard, scope).await? {
                found.push(role);
            }
        }
        Ok(found)
    }

    async fn list_roles(&self) -> StorageResult<Vec<RoleRecord>> {
        let mut roles: Vec<RoleRecord> = self.roles.iter().map(|r| r.value().clone()).collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    #[instrument(skip(self))]
    async fn delete_roles(&self, ids: &[i64]) -> StorageResult<u64> {
        let mut deleted = 0u64;
        for id in ids {
            let Some((_, record)) = self.roles.remove(id) else {
                continue;
            };
            self.role_ids.remove(&RoleKey::of_record(&record));
            self.role_permissions.remove(id);
            for mut entry in self.subject_roles.iter_mut() {
                entry.value_mut().remove(id);
            }
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn find_permission(
        &self,
        name: &str,
        guard: &str,
    ) -> StorageResult<Option<PermissionRecord>> {
        validate_name(name)?;
        validate_guard(guard)?;

        let id = match self.permission_ids.get(&PermissionKey::new(name, guard)) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        Ok(self.permissions.get(&id).map(|p| p.value().clone()))
    }

    #[instrument(skip(self))]
    async fn find_or_create_permission(
        &self,
        name: &str,
        guard: &str,
    ) -> StorageResult<PermissionRecord> {
        validate_name(name)?;
        validate_guard(guard)?;

        use dashmap::mapref::entry::Entry;
        match self.permission_ids.entry(PermissionKey::new(name, guard)) {
            Entry::Occupied(entry) => self.permission_by_id(*entry.get()),
            Entry::Vacant(entry) => {
                let id = self.next_permission_id.fetch_add(1, Ordering::Relaxed) + 1;
                let record = PermissionRecord {
                    id,
                    name: name.to_string(),
                    guard_name: guard.to_string(),
                    created_at: chrono::Utc::now(),
                };
                self.permissions.insert(id, record.clone());
                entry.insert(id);
                Ok(record)
            }
        }
    }

    async fn find_permissions_by_names(
        &self,
        names: &[String],
        guard: &str,
    ) -> StorageResult<Vec<PermissionRecord>> {
        validate_guard(guard)?;

        let mut found = Vec::new();
        for name in names {
            if let Some(permission) = self.find_permission(name, guard).await? {
                found.push(permission);
            }
        }
        Ok(found)
    }

    async fn list_permissions(&self) -> StorageResult<Vec<PermissionRecord>> {
        let mut permissions: Vec<PermissionRecord> =
            self.permissions.iter().map(|p| p.value().clone()).collect();
        permissions.sort_by_key(|p| p.id);
        Ok(permissions)
    }

    #[instrument(skip(self))]
    async fn delete_permissions(&self, ids: &[i64]) -> StorageResult<u64> {
        let mut deleted = 0u64;
        for id in ids {
            let Some((_, record)) = self.permissions.remove(id) else {
                continue;
            };
            self.permission_ids
                .remove(&PermissionKey::new(&record.name, &record.guard_name));
            for mut entry in self.role_permissions.iter_mut() {
                entry.value_mut().remove(id);
            }
            for mut entry in self.subject_permissions.iter_mut() {
                entry.value_mut().remove(id);
            }
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn attach_permission_to_role(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StorageResult<()> {
        if !self.roles.contains_key(&role_id) {
            return Err(StorageError::RoleNotFound { role_id });
        }
        if !self.permissions.contains_key(&permission_id) {
            return Err(StorageError::PermissionNotFound { permission_id });
        }
        // HashSet::insert is idempotent
        self.role_permissions
            .entry(role_id)
            .or_default()
            .insert(permission_id);
        Ok(())
    }

    async fn detach_permission_from_role(
        &self,
        role_id: i64,
        permission_id: i64,
    ) -> StorageResult<()> {
        if let Some(mut set) = self.role_permissions.get_mut(&role_id) {
            set.remove(&permission_id);
        }
        Ok(())
    }

    async fn replace_role_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> StorageResult<()> {
        if !self.roles.contains_key(&role_id) {
            return Err(StorageError::RoleNotFound { role_id });
        }
        for permission_id in permission_ids {
            if !self.permissions.contains_key(permission_id) {
                return Err(StorageError::PermissionNotFound {
                    permission_id: *permission_id,
                });
            }
        }

        // Single entry guard makes the clear + extend atomic to other callers.
        let mut set = self.role_permissions.entry(role_id).or_default();
        set.clear();
        set.extend(permission_ids.iter().copied());
        Ok(())
    }

    async fn any_role_has_permission(
        &self,
        role_ids: &[i64],
        permission_id: i64,
    ) -> StorageResult<bool> {
        for role_id in role_ids {
            if let Some(set) = self.role_permissions.get(role_id) {
                if set.contains(&permission_id) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn list_role_permissions(&self) -> StorageResult<Vec<RolePermissionRow>> {
        let mut rows = Vec::new();
        for entry in self.role_permissions.iter() {
            let role = match self.roles.get(entry.key()) {
                Some(role) => role.value().clone(),
                // Edge owner was deleted concurrently; skip rather than fail.
                None => continue,
            };
            for permission_id in entry.value() {
                if let Some(permission) = self.permissions.get(permission_id) {
                    rows.push(RolePermissionRow {
                        role: role.clone(),
                        permission: permission.value().clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn attach_role_to_subject(&self, subject: &Subject, role_id: i64) -> StorageResult<()> {
        validate_subject(subject)?;
        if !self.roles.contains_key(&role_id) {
            return Err(StorageError::RoleNotFound { role_id });
        }
        self.subject_roles
            .entry(subject.clone())
            .or_default()
            .insert(role_id);
        Ok(())
    }

    async fn detach_role_from_subject(
        &self,
        subject: &Subject,
        role_id: i64,
    ) -> StorageResult<()> {
        validate_subject(subject)?;
        if let Some(mut set) = self.subject_roles.get_mut(subject) {
            set.remove(&role_id);
        }
        Ok(())
    }

    async fn replace_subject_roles(
        &self,
        subject: &Subject,
        role_ids: &[i64],
    ) -> StorageResult<()> {
        validate_subject(subject)?;
        for role_id in role_ids {
            if !self.roles.contains_key(role_id) {
                return Err(StorageError::RoleNotFound { role_id: *role_id });
            }
        }

        let mut set = self.subject_roles.entry(subject.clone()).or_default();
        set.clear();
        set.extend(role_ids.iter().copied());
        Ok(())
    }

    async fn subject_has_role(&self, subject: &Subject, role_id: i64) -> StorageResult<bool> {
        validate_subject(subject)?;
        Ok(self
            .subject_roles
            .get(subject)
            .is_some_and(|set| set.contains(&role_id)))
    }

    async fn role_ids_for_subject(&self, subject: &Subject) -> StorageResult<Vec<i64>> {
        validate_subject(subject)?;
        let mut ids: Vec<i64> = self
            .subject_roles
            .get(subject)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn list_subject_roles(&self) -> StorageResult<Vec<SubjectRoleRow>> {
        let mut rows = Vec::new();
        for entry in self.subject_roles.iter() {
            for role_id in entry.value() {
                if let Some(role) = self.roles.get(role_id) {
                    rows.push(SubjectRoleRow {
                        subject: entry.key().clone(),
                        role: role.value().clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn attach_permission_to_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> StorageResult<()> {
        validate_subject(subject)?;
        if !self.permissions.contains_key(&permission_id) {
            return Err(StorageError::PermissionNotFound { permission_id });
        }
        self.subject_permissions
            .entry(subject.clone())
            .or_default()
            .insert(permission_id);
        Ok(())
    }

    async fn detach_permission_from_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> StorageResult<()> {
        validate_subject(subject)?;
        if let Some(mut set) = self.subject_permissions.get_mut(subject) {
            set.remove(&permission_id);
        }
        Ok(())
    }

    async fn replace_subject_permissions(
        &self,
        subject: &Subject,
        permission_ids: &[i64],
    ) -> StorageResult<()> {
        validate_subject(subject)?;
        for permission_id in permission_ids {
            if !self.permissions.contains_key(permission_id) {
                return Err(StorageError::PermissionNotFound {
                    permission_id: *permission_id,
                });
            }
        }

        let mut set = self.subject_permissions.entry(subject.clone()).or_default();
        set.clear();
        set.extend(permission_ids.iter().copied());
        Ok(())
    }

    async fn subject_has_permission(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> StorageResult<bool> {
        validate_subject(subject)?;
        Ok(self
            .subject_permissions
            .get(subject)
            .is_some_and(|set| set.contains(&permission_id)))
    }

    async fn list_subject_permissions(&self) -> StorageResult<Vec<SubjectPermissionRow>> {
        let mut rows = Vec::new();
        for entry in self.subject_permissions.iter() {
            for permission_id in entry.value() {
                if let Some(permission) = self.permissions.get(permission_id) {
                    rows.push(SubjectPermissionRow {
                        subject: entry.key().clone(),
                        permission: permission.value().clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = std::time::Instant::now();
        let _ = self.roles.len();
        Ok(HealthStatus {
            healthy: true,
            latency: start.elapsed(),
            pool_stats: None,
            message: Some("memory".to_string()),
        })
    }
}
