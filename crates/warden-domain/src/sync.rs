//! Declarative state sync: reconcile persisted RBAC state toward a snapshot.
//!
//! A [`RbacSnapshot`] names the desired roles, permissions, and mapping
//! edges. [`RbacEngine::sync_state`] converges the store toward it in a
//! fixed order (catalogs, then edges, then the prunes enabled by
//! [`SyncOptions`]) and reports what changed. Every step is idempotent, so
//! re-running a sync after a partial failure converges without
//! double-applying anything.
//!
//! With [`SyncOptions::dry_run`] the whole walk is read-only: the returned
//! [`SyncReport`] counts what a real run would change and the store is left
//! untouched. [`RbacEngine::export_state`] is the inverse read, producing a
//! snapshot in the same shape, so apply, export, and diff round-trip.

use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use warden_storage::{RbacStore, Subject, TenantScope};

use crate::engine::RbacEngine;
use crate::error::{RbacError, RbacResult};
use crate::model::DEFAULT_GUARD;

fn default_guard() -> String {
    DEFAULT_GUARD.to_string()
}

/// A desired role: full identity, with guard defaulting and an optional
/// tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub name: String,
    #[serde(default = "default_guard")]
    pub guard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roleable_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roleable_type: Option<String>,
}

impl RoleSpec {
    /// A global role on the default guard.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: default_guard(),
            roleable_id: None,
            roleable_type: None,
        }
    }

    /// The tenant scope encoded by the roleable fields.
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            roleable_id: self.roleable_id,
            roleable_type: self.roleable_type.clone(),
        }
    }
}

/// A desired permission.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSpec {
    pub name: String,
    #[serde(default = "default_guard")]
    pub guard: String,
}

impl PermissionSpec {
    /// A permission on the default guard.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: default_guard(),
        }
    }
}

/// A desired role-to-permission mapping. The roleable fields address the
/// role by its tenant scope; the permission is scope-free.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionSpec {
    pub role_name: String,
    pub permission_name: String,
    #[serde(default = "default_guard")]
    pub guard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roleable_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roleable_type: Option<String>,
}

impl RolePermissionSpec {
    pub fn new(role_name: impl Into<String>, permission_name: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            permission_name: permission_name.into(),
            guard: default_guard(),
            roleable_id: None,
            roleable_type: None,
        }
    }

    /// The tenant scope the role is addressed under.
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            roleable_id: self.roleable_id,
            roleable_type: self.roleable_type.clone(),
        }
    }
}

/// A desired subject-to-role assignment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRoleSpec {
    pub model_type: String,
    pub model_id: i64,
    pub role_name: String,
    #[serde(default = "default_guard")]
    pub guard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roleable_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roleable_type: Option<String>,
}

impl ModelRoleSpec {
    pub fn new(model_type: impl Into<String>, model_id: i64, role_name: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            model_id,
            role_name: role_name.into(),
            guard: default_guard(),
            roleable_id: None,
            roleable_type: None,
        }
    }

    pub fn subject(&self) -> Subject {
        Subject::new(&self.model_type, self.model_id)
    }

    /// The tenant scope the role is addressed under.
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            roleable_id: self.roleable_id,
            roleable_type: self.roleable_type.clone(),
        }
    }
}

/// A desired direct subject-to-permission grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPermissionSpec {
    pub model_type: String,
    pub model_id: i64,
    pub permission_name: String,
    #[serde(default = "default_guard")]
    pub guard: String,
}

impl ModelPermissionSpec {
    pub fn new(
        model_type: impl Into<String>,
        model_id: i64,
        permission_name: impl Into<String>,
    ) -> Self {
        Self {
            model_type: model_type.into(),
            model_id,
            permission_name: permission_name.into(),
            guard: default_guard(),
        }
    }

    pub fn subject(&self) -> Subject {
        Subject::new(&self.model_type, self.model_id)
    }
}

/// The full declarative shape: two catalogs and three edge tables. Every
/// array is optional in the serialized form; absent means empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacSnapshot {
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub permissions: Vec<PermissionSpec>,
    #[serde(default)]
    pub role_permissions: Vec<RolePermissionSpec>,
    #[serde(default)]
    pub model_roles: Vec<ModelRoleSpec>,
    #[serde(default)]
    pub model_permissions: Vec<ModelPermissionSpec>,
}

/// The third document consumed by [`RbacEngine::sync_from_files`]: the
/// three edge arrays bundled into one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingsFile {
    #[serde(default)]
    pub role_permissions: Vec<RolePermissionSpec>,
    #[serde(default)]
    pub model_roles: Vec<ModelRoleSpec>,
    #[serde(default)]
    pub model_permissions: Vec<ModelPermissionSpec>,
}

/// Flags controlling [`RbacEngine::sync_state`]. All default to off: a
/// plain sync only adds, never removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete persisted roles whose full identity is absent from the
    /// snapshot.
    pub prune_extra_roles: bool,
    /// Delete persisted permissions whose `(name, guard)` is absent from
    /// the snapshot.
    pub prune_extra_permissions: bool,
    /// Detach role-to-permission edges absent from the snapshot.
    pub prune_extra_role_permissions: bool,
    /// Detach subject-to-role edges absent from the snapshot.
    pub prune_extra_model_roles: bool,
    /// Revoke direct grants absent from the snapshot.
    pub prune_extra_model_permissions: bool,
    /// Walk the whole sync read-only and report what would change.
    pub dry_run: bool,
}

impl SyncOptions {
    /// Every prune flag enabled; dry run stays off.
    pub fn prune_all() -> Self {
        Self {
            prune_extra_roles: true,
            prune_extra_permissions: true,
            prune_extra_role_permissions: true,
            prune_extra_model_roles: true,
            prune_extra_model_permissions: true,
            dry_run: false,
        }
    }
}

/// What a sync changed, or would change under `dry_run`. Attach counters
/// cover new rows only; rows that already matched the snapshot are not
/// counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub roles_created: u64,
    pub permissions_created: u64,
    pub role_permissions_attached: u64,
    pub model_roles_attached: u64,
    pub model_permissions_attached: u64,
    pub roles_pruned: u64,
    pub permissions_pruned: u64,
    pub role_permissions_pruned: u64,
    pub model_roles_pruned: u64,
    pub model_permissions_pruned: u64,
}

impl SyncReport {
    /// Sum of every counter. Zero means the store already matched the
    /// snapshot.
    pub fn total_changes(&self) -> u64 {
        self.roles_created
            + self.permissions_created
            + self.role_permissions_attached
            + self.model_roles_attached
            + self.model_permissions_attached
            + self.roles_pruned
            + self.permissions_pruned
            + self.role_permissions_pruned
            + self.model_roles_pruned
            + self.model_permissions_pruned
    }
}

/// Narrows [`RbacEngine::export_state`] output. The default exports
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFilter {
    /// Keep only entries on this guard.
    pub guard: Option<String>,
}

impl ExportFilter {
    pub fn guard(guard: impl Into<String>) -> Self {
        Self {
            guard: Some(guard.into()),
        }
    }

    fn matches(&self, guard: &str) -> bool {
        self.guard.as_deref().map_or(true, |wanted| wanted == guard)
    }
}

impl<S: RbacStore> RbacEngine<S> {
    /// Reconciles persisted state toward `snapshot`.
    ///
    /// Processing order: roles, permissions, role-permission edges,
    /// model-role edges, model-permission edges, then the prunes enabled
    /// by `options`. Catalog prunes match on full identity, so a snapshot
    /// listing `admin` for one tenant does not shield another tenant's
    /// `admin`; pruning a role or permission cascades to its edges. Edge
    /// prunes match on the name-based composite key of each mapping.
    ///
    /// A non-dry run flushes the decision cache once at the end. A dry run
    /// touches neither the store nor the cache.
    #[instrument(skip(self, snapshot))]
    pub async fn sync_state(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
    ) -> RbacResult<SyncReport> {
        let mut report = SyncReport {
            dry_run: options.dry_run,
            ..SyncReport::default()
        };

        self.sync_roles_step(snapshot, options, &mut report).await?;
        self.sync_permissions_step(snapshot, options, &mut report).await?;
        self.sync_role_permission_edges(snapshot, options, &mut report).await?;
        self.sync_model_role_edges(snapshot, options, &mut report).await?;
        self.sync_model_permission_edges(snapshot, options, &mut report).await?;

        // Ids doomed by the catalog prunes. Edge prunes skip rows whose
        // endpoint is in these sets so a dry run reports the same edge
        // counts as a real run, where the cascade already removed them.
        let mut pruned_role_ids = HashSet::new();
        let mut pruned_permission_ids = HashSet::new();

        if options.prune_extra_roles {
            self.prune_roles(snapshot, options, &mut report, &mut pruned_role_ids)
                .await?;
        }
        if options.prune_extra_permissions {
            self.prune_permissions(snapshot, options, &mut report, &mut pruned_permission_ids)
                .await?;
        }
        if options.prune_extra_role_permissions {
            self.prune_role_permission_edges(
                snapshot,
                options,
                &mut report,
                &pruned_role_ids,
                &pruned_permission_ids,
            )
            .await?;
        }
        if options.prune_extra_model_roles {
            self.prune_model_role_edges(snapshot, options, &mut report, &pruned_role_ids)
                .await?;
        }
        if options.prune_extra_model_permissions {
            self.prune_model_permission_edges(
                snapshot,
                options,
                &mut report,
                &pruned_permission_ids,
            )
            .await?;
        }

        if !options.dry_run {
            self.cache.flush();
        }
        info!(
            dry_run = options.dry_run,
            changes = report.total_changes(),
            "state sync complete"
        );
        Ok(report)
    }

    async fn sync_roles_step(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> RbacResult<()> {
        let mut seen = HashSet::new();
        for spec in &snapshot.roles {
            if !seen.insert((
                spec.name.as_str(),
                spec.guard.as_str(),
                spec.roleable_id,
                spec.roleable_type.as_deref(),
            )) {
                continue;
            }
            let scope = spec.scope();
            if self.store.find_role(&spec.name, &spec.guard, &scope).await?.is_none() {
                if !options.dry_run {
                    self.store.find_or_create_role(&spec.name, &spec.guard, &scope).await?;
                }
                report.roles_created += 1;
            }
        }
        Ok(())
    }

    async fn sync_permissions_step(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> RbacResult<()> {
        let mut seen = HashSet::new();
        for spec in &snapshot.permissions {
            if !seen.insert((spec.name.as_str(), spec.guard.as_str())) {
                continue;
            }
            if self.store.find_permission(&spec.name, &spec.guard).await?.is_none() {
                if !options.dry_run {
                    self.store.find_or_create_permission(&spec.name, &spec.guard).await?;
                }
                report.permissions_created += 1;
            }
        }
        Ok(())
    }

    async fn sync_role_permission_edges(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> RbacResult<()> {
        let mut seen = HashSet::new();
        for spec in &snapshot.role_permissions {
            if !seen.insert((
                spec.role_name.as_str(),
                spec.permission_name.as_str(),
                spec.guard.as_str(),
                spec.roleable_id,
                spec.roleable_type.as_deref(),
            )) {
                continue;
            }
            let scope = spec.scope();
            if options.dry_run {
                let role = self.store.find_role(&spec.role_name, &spec.guard, &scope).await?;
                let permission =
                    self.store.find_permission(&spec.permission_name, &spec.guard).await?;
                let attached = match (role, permission) {
                    (Some(role), Some(permission)) => {
                        self.store.any_role_has_permission(&[role.id], permission.id).await?
                    }
                    _ => false,
                };
                if !attached {
                    report.role_permissions_attached += 1;
                }
            } else {
                let role =
                    self.store.find_or_create_role(&spec.role_name, &spec.guard, &scope).await?;
                let permission = self
                    .store
                    .find_or_create_permission(&spec.permission_name, &spec.guard)
                    .await?;
                if !self.store.any_role_has_permission(&[role.id], permission.id).await? {
                    self.store.attach_permission_to_role(role.id, permission.id).await?;
                    report.role_permissions_attached += 1;
                }
            }
        }
        Ok(())
    }

    async fn sync_model_role_edges(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> RbacResult<()> {
        let mut seen = HashSet::new();
        for spec in &snapshot.model_roles {
            if !seen.insert((
                spec.model_type.as_str(),
                spec.model_id,
                spec.role_name.as_str(),
                spec.guard.as_str(),
                spec.roleable_id,
                spec.roleable_type.as_deref(),
            )) {
                continue;
            }
            let subject = spec.subject();
            let scope = spec.scope();
            if options.dry_run {
                let attached =
                    match self.store.find_role(&spec.role_name, &spec.guard, &scope).await? {
                        Some(role) => self.store.subject_has_role(&subject, role.id).await?,
                        None => false,
                    };
                if !attached {
                    report.model_roles_attached += 1;
                }
            } else {
                let role =
                    self.store.find_or_create_role(&spec.role_name, &spec.guard, &scope).await?;
                if !self.store.subject_has_role(&subject, role.id).await? {
                    self.store.attach_role_to_subject(&subject, role.id).await?;
                    report.model_roles_attached += 1;
                }
            }
        }
        Ok(())
    }

    async fn sync_model_permission_edges(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> RbacResult<()> {
        let mut seen = HashSet::new();
        for spec in &snapshot.model_permissions {
            if !seen.insert((
                spec.model_type.as_str(),
                spec.model_id,
                spec.permission_name.as_str(),
                spec.guard.as_str(),
            )) {
                continue;
            }
            let subject = spec.subject();
            if options.dry_run {
                let granted = match self
                    .store
                    .find_permission(&spec.permission_name, &spec.guard)
                    .await?
                {
                    Some(permission) => {
                        self.store.subject_has_permission(&subject, permission.id).await?
                    }
                    None => false,
                };
                if !granted {
                    report.model_permissions_attached += 1;
                }
            } else {
                let permission = self
                    .store
                    .find_or_create_permission(&spec.permission_name, &spec.guard)
                    .await?;
                if !self.store.subject_has_permission(&subject, permission.id).await? {
                    self.store.attach_permission_to_subject(&subject, permission.id).await?;
                    report.model_permissions_attached += 1;
                }
            }
        }
        Ok(())
    }

    async fn prune_roles(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
        pruned_ids: &mut HashSet<i64>,
    ) -> RbacResult<()> {
        let keep: HashSet<_> = snapshot
            .roles
            .iter()
            .map(|spec| {
                (
                    spec.name.as_str(),
                    spec.guard.as_str(),
                    spec.roleable_id,
                    spec.roleable_type.as_deref(),
                )
            })
            .collect();

        let mut doomed = Vec::new();
        for role in self.store.list_roles().await? {
            let key = (
                role.name.as_str(),
                role.guard_name.as_str(),
                role.roleable_id,
                role.roleable_type.as_deref(),
            );
            if !keep.contains(&key) {
                doomed.push(role.id);
            }
        }
        pruned_ids.extend(doomed.iter().copied());
        if doomed.is_empty() {
            return Ok(());
        }

        if options.dry_run {
            report.roles_pruned += doomed.len() as u64;
        } else {
            report.roles_pruned += self.store.delete_roles(&doomed).await?;
            info!(count = doomed.len(), "pruned roles absent from the snapshot");
        }
        Ok(())
    }

    async fn prune_permissions(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
        pruned_ids: &mut HashSet<i64>,
    ) -> RbacResult<()> {
        let keep: HashSet<_> = snapshot
            .permissions
            .iter()
            .map(|spec| (spec.name.as_str(), spec.guard.as_str()))
            .collect();

        let mut doomed = Vec::new();
        for permission in self.store.list_permissions().await? {
            let key = (permission.name.as_str(), permission.guard_name.as_str());
            if !keep.contains(&key) {
                doomed.push(permission.id);
            }
        }
        pruned_ids.extend(doomed.iter().copied());
        if doomed.is_empty() {
            return Ok(());
        }

        if options.dry_run {
            report.permissions_pruned += doomed.len() as u64;
        } else {
            report.permissions_pruned += self.store.delete_permissions(&doomed).await?;
            info!(count = doomed.len(), "pruned permissions absent from the snapshot");
        }
        Ok(())
    }

    async fn prune_role_permission_edges(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
        pruned_role_ids: &HashSet<i64>,
        pruned_permission_ids: &HashSet<i64>,
    ) -> RbacResult<()> {
        // Edge prune keys are name-based and scope-blind; only the catalog
        // prunes above match on full identity.
        let keep: HashSet<_> = snapshot
            .role_permissions
            .iter()
            .map(|spec| {
                (
                    spec.role_name.as_str(),
                    spec.permission_name.as_str(),
                    spec.guard.as_str(),
                )
            })
            .collect();

        for row in self.store.list_role_permissions().await? {
            if pruned_role_ids.contains(&row.role.id)
                || pruned_permission_ids.contains(&row.permission.id)
            {
                continue;
            }
            let key = (
                row.role.name.as_str(),
                row.permission.name.as_str(),
                row.permission.guard_name.as_str(),
            );
            if keep.contains(&key) {
                continue;
            }
            if !options.dry_run {
                self.store.detach_permission_from_role(row.role.id, row.permission.id).await?;
            }
            report.role_permissions_pruned += 1;
        }
        Ok(())
    }

    async fn prune_model_role_edges(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
        pruned_role_ids: &HashSet<i64>,
    ) -> RbacResult<()> {
        let keep: HashSet<_> = snapshot
            .model_roles
            .iter()
            .map(|spec| (spec.model_type.as_str(), spec.model_id, spec.role_name.as_str()))
            .collect();

        for row in self.store.list_subject_roles().await? {
            if pruned_role_ids.contains(&row.role.id) {
                continue;
            }
            let key = (row.subject.kind.as_str(), row.subject.id, row.role.name.as_str());
            if keep.contains(&key) {
                continue;
            }
            if !options.dry_run {
                self.store.detach_role_from_subject(&row.subject, row.role.id).await?;
            }
            report.model_roles_pruned += 1;
        }
        Ok(())
    }

    async fn prune_model_permission_edges(
        &self,
        snapshot: &RbacSnapshot,
        options: SyncOptions,
        report: &mut SyncReport,
        pruned_permission_ids: &HashSet<i64>,
    ) -> RbacResult<()> {
        let keep: HashSet<_> = snapshot
            .model_permissions
            .iter()
            .map(|spec| {
                (
                    spec.model_type.as_str(),
                    spec.model_id,
                    spec.permission_name.as_str(),
                )
            })
            .collect();

        for row in self.store.list_subject_permissions().await? {
            if pruned_permission_ids.contains(&row.permission.id) {
                continue;
            }
            let key = (
                row.subject.kind.as_str(),
                row.subject.id,
                row.permission.name.as_str(),
            );
            if keep.contains(&key) {
                continue;
            }
            if !options.dry_run {
                self.store
                    .detach_permission_from_subject(&row.subject, row.permission.id)
                    .await?;
            }
            report.model_permissions_pruned += 1;
        }
        Ok(())
    }

    /// The inverse read of [`sync_state`](Self::sync_state): dumps both
    /// catalogs and all three edge tables in the shape `sync_state`
    /// accepts. Output is sorted, so identical state exports an identical
    /// document.
    pub async fn export_state(&self, filter: &ExportFilter) -> RbacResult<RbacSnapshot> {
        let mut snapshot = RbacSnapshot::default();

        for role in self.store.list_roles().await? {
            if !filter.matches(&role.guard_name) {
                continue;
            }
            snapshot.roles.push(RoleSpec {
                name: role.name,
                guard: role.guard_name,
                roleable_id: role.roleable_id,
                roleable_type: role.roleable_type,
            });
        }
        for permission in self.store.list_permissions().await? {
            if !filter.matches(&permission.guard_name) {
                continue;
            }
            snapshot.permissions.push(PermissionSpec {
                name: permission.name,
                guard: permission.guard_name,
            });
        }
        for row in self.store.list_role_permissions().await? {
            if !filter.matches(&row.permission.guard_name) {
                continue;
            }
            snapshot.role_permissions.push(RolePermissionSpec {
                role_name: row.role.name,
                permission_name: row.permission.name,
                guard: row.permission.guard_name,
                roleable_id: row.role.roleable_id,
                roleable_type: row.role.roleable_type,
            });
        }
        for row in self.store.list_subject_roles().await? {
            if !filter.matches(&row.role.guard_name) {
                continue;
            }
            snapshot.model_roles.push(ModelRoleSpec {
                model_type: row.subject.kind,
                model_id: row.subject.id,
                role_name: row.role.name,
                guard: row.role.guard_name,
                roleable_id: row.role.roleable_id,
                roleable_type: row.role.roleable_type,
            });
        }
        for row in self.store.list_subject_permissions().await? {
            if !filter.matches(&row.permission.guard_name) {
                continue;
            }
            snapshot.model_permissions.push(ModelPermissionSpec {
                model_type: row.subject.kind,
                model_id: row.subject.id,
                permission_name: row.permission.name,
                guard: row.permission.guard_name,
            });
        }

        snapshot.roles.sort();
        snapshot.permissions.sort();
        snapshot.role_permissions.sort();
        snapshot.model_roles.sort();
        snapshot.model_permissions.sort();
        Ok(snapshot)
    }

    /// Reads three JSON documents (a role array, a permission array, and a
    /// [`MappingsFile`]) and delegates to [`sync_state`](Self::sync_state).
    pub async fn sync_from_files(
        &self,
        role_path: &Path,
        permission_path: &Path,
        mapping_path: &Path,
        options: SyncOptions,
    ) -> RbacResult<SyncReport> {
        let roles: Vec<RoleSpec> = read_json(role_path).await?;
        let permissions: Vec<PermissionSpec> = read_json(permission_path).await?;
        let mappings: MappingsFile = read_json(mapping_path).await?;
        debug!(
            roles = roles.len(),
            permissions = permissions.len(),
            role_permissions = mappings.role_permissions.len(),
            model_roles = mappings.model_roles.len(),
            model_permissions = mappings.model_permissions.len(),
            "loaded snapshot files"
        );

        let snapshot = RbacSnapshot {
            roles,
            permissions,
            role_permissions: mappings.role_permissions,
            model_roles: mappings.model_roles,
            model_permissions: mappings.model_permissions,
        };
        self.sync_state(&snapshot, options).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> RbacResult<T> {
    let bytes = tokio::fs::read(path).await.map_err(|source| RbacError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| RbacError::SnapshotParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_spec_defaults_guard_and_scope() {
        let spec: RoleSpec = serde_json::from_str(r#"{"name":"editor"}"#).unwrap();
        assert_eq!(spec.guard, "web");
        assert!(spec.scope().is_global());

        // Scope fields stay out of the serialized form when unset.
        let json = serde_json::to_string(&spec).unwrap();
        assert!(!json.contains("roleableId"));
        assert!(!json.contains("roleableType"));
    }

    #[test]
    fn test_scoped_role_spec_round_trips() {
        let json = r#"{"name":"admin","guard":"api","roleableId":7,"roleableType":"Org"}"#;
        let spec: RoleSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.scope(), TenantScope::of("Org", 7));
        assert_eq!(serde_json::to_string(&spec).unwrap(), json);
    }

    #[test]
    fn test_edge_specs_use_camel_case() {
        let spec: RolePermissionSpec =
            serde_json::from_str(r#"{"roleName":"editor","permissionName":"publish"}"#).unwrap();
        assert_eq!(spec.role_name, "editor");
        assert_eq!(spec.permission_name, "publish");
        assert_eq!(spec.guard, "web");

        let spec: ModelRoleSpec =
            serde_json::from_str(r#"{"modelType":"User","modelId":1,"roleName":"editor"}"#)
                .unwrap();
        assert_eq!(spec.subject(), Subject::new("User", 1));
        assert!(spec.scope().is_global());
    }

    #[test]
    fn test_snapshot_tolerates_missing_arrays() {
        let snapshot: RbacSnapshot = serde_json::from_str(r#"{"roles":[{"name":"a"}]}"#).unwrap();
        assert_eq!(snapshot.roles.len(), 1);
        assert!(snapshot.permissions.is_empty());
        assert!(snapshot.model_roles.is_empty());

        let empty: RbacSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RbacSnapshot::default());
    }

    #[test]
    fn test_mappings_file_shape() {
        let json = r#"{
            "rolePermissions": [{"roleName":"editor","permissionName":"publish"}],
            "modelRoles": [{"modelType":"User","modelId":1,"roleName":"editor"}]
        }"#;
        let mappings: MappingsFile = serde_json::from_str(json).unwrap();
        assert_eq!(mappings.role_permissions.len(), 1);
        assert_eq!(mappings.model_roles.len(), 1);
        assert!(mappings.model_permissions.is_empty());
    }

    #[test]
    fn test_export_filter_matches() {
        assert!(ExportFilter::default().matches("web"));
        assert!(ExportFilter::default().matches("api"));
        assert!(ExportFilter::guard("web").matches("web"));
        assert!(!ExportFilter::guard("web").matches("api"));
    }

    #[test]
    fn test_report_total_changes() {
        let mut report = SyncReport::default();
        assert_eq!(report.total_changes(), 0);

        report.roles_created = 2;
        report.model_roles_attached = 1;
        report.permissions_pruned = 3;
        assert_eq!(report.total_changes(), 6);
    }

    #[test]
    fn test_prune_all_leaves_dry_run_off() {
        let options = SyncOptions::prune_all();
        assert!(options.prune_extra_roles);
        assert!(options.prune_extra_model_permissions);
        assert!(!options.dry_run);
    }
}
