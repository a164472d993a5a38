//! Tenant-bound view over the engine.

use warden_storage::{RbacStore, Subject, TenantScope};

use crate::error::RbacResult;
use crate::model::{Permission, Role};

use super::RbacEngine;

/// A borrowed view of an [`RbacEngine`] with the tenant scope fixed.
///
/// Every scope-taking operation forwards to the engine with the bound
/// scope, so call sites inside one tenant do not thread the scope through
/// every call. Created by [`RbacEngine::scoped`].
pub struct ScopedEngine<'a, S> {
    engine: &'a RbacEngine<S>,
    scope: TenantScope,
}

impl<'a, S: RbacStore> ScopedEngine<'a, S> {
    pub(super) fn new(engine: &'a RbacEngine<S>, scope: TenantScope) -> Self {
        Self { engine, scope }
    }

    /// The scope this view is bound to.
    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// The underlying engine, for operations that do not take a scope.
    pub fn engine(&self) -> &RbacEngine<S> {
        self.engine
    }

    /// See [`RbacEngine::find_role`].
    pub async fn find_role(&self, name: &str, guard: &str) -> RbacResult<Option<Role>> {
        self.engine.find_role(name, guard, &self.scope).await
    }

    /// See [`RbacEngine::find_or_create_role`].
    pub async fn find_or_create_role(&self, name: &str, guard: &str) -> RbacResult<Role> {
        self.engine.find_or_create_role(name, guard, &self.scope).await
    }

    /// See [`RbacEngine::find_permission`].
    pub async fn find_permission(&self, name: &str, guard: &str) -> RbacResult<Option<Permission>> {
        self.engine.find_permission(name, guard).await
    }

    /// See [`RbacEngine::give_permission_to_role`].
    pub async fn give_permission_to_role(
        &self,
        role_name: &str,
        permission_name: &str,
        guard: &str,
    ) -> RbacResult<()> {
        self.engine
            .give_permission_to_role(role_name, permission_name, guard, &self.scope)
            .await
    }

    /// See [`RbacEngine::revoke_permission_from_role`].
    pub async fn revoke_permission_from_role(
        &self,
        role_name: &str,
        permission_name: &str,
        guard: &str,
    ) -> RbacResult<()> {
        self.engine
            .revoke_permission_from_role(role_name, permission_name, guard, &self.scope)
            .await
    }

    /// See [`RbacEngine::sync_permissions_for_role`].
    pub async fn sync_permissions_for_role(
        &self,
        role_name: &str,
        permission_names: &[&str],
        guard: &str,
    ) -> RbacResult<()> {
        self.engine
            .sync_permissions_for_role(role_name, permission_names, guard, &self.scope)
            .await
    }

    /// See [`RbacEngine::sync_roles`].
    pub async fn sync_roles(
        &self,
        subject: &Subject,
        role_names: &[&str],
        guard: &str,
    ) -> RbacResult<()> {
        self.engine.sync_roles(subject, role_names, guard, &self.scope).await
    }

    /// See [`RbacEngine::assign_role`].
    pub async fn assign_role(
        &self,
        subject: &Subject,
        role_name: &str,
        guard: &str,
    ) -> RbacResult<()> {
        self.engine.assign_role(subject, role_name, guard, &self.scope).await
    }

    /// See [`RbacEngine::remove_role`].
    pub async fn remove_role(
        &self,
        subject: &Subject,
        role_name: &str,
        guard: &str,
    ) -> RbacResult<()> {
        self.engine.remove_role(subject, role_name, guard, &self.scope).await
    }

    /// See [`RbacEngine::has_role`].
    pub async fn has_role(
        &self,
        subject: &Subject,
        role_name: &str,
        guard: &str,
    ) -> RbacResult<bool> {
        self.engine.has_role(subject, role_name, guard, &self.scope).await
    }

    /// See [`RbacEngine::has_any_role`].
    pub async fn has_any_role(
        &self,
        subject: &Subject,
        role_names: &[&str],
        guard: &str,
    ) -> RbacResult<bool> {
        self.engine.has_any_role(subject, role_names, guard, &self.scope).await
    }

    /// See [`RbacEngine::has_all_roles`].
    pub async fn has_all_roles(
        &self,
        subject: &Subject,
        role_names: &[&str],
        guard: &str,
    ) -> RbacResult<bool> {
        self.engine.has_all_roles(subject, role_names, guard, &self.scope).await
    }

    /// See [`RbacEngine::can`].
    pub async fn can(
        &self,
        subject: &Subject,
        permission_name: &str,
        guard: &str,
    ) -> RbacResult<bool> {
        self.engine.can(subject, permission_name, guard, &self.scope).await
    }

    /// See [`RbacEngine::is_super_admin`].
    pub async fn is_super_admin(&self, subject: &Subject, guard: &str) -> RbacResult<bool> {
        self.engine.is_super_admin(subject, guard, &self.scope).await
    }

    /// See [`RbacEngine::authorize`].
    pub async fn authorize(
        &self,
        subject: &Subject,
        ability: &str,
        guard: &str,
    ) -> RbacResult<bool> {
        self.engine.authorize(subject, ability, guard, &self.scope).await
    }
}
