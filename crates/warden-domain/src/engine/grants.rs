//! Grant management: role permissions, subject roles and direct grants.
//!
//! Every operation here mutates the RBAC graph and finishes by flushing the
//! decision cache, whether or not a row actually changed.

use tracing::instrument;

use warden_storage::{RbacStore, Subject, TenantScope};

use crate::error::RbacResult;

use super::RbacEngine;

impl<S: RbacStore> RbacEngine<S> {
    /// Attaches `permission_name` to `role_name`, creating either side when
    /// missing. Attaching an existing pair is a no-op.
    #[instrument(skip(self))]
    pub async fn give_permission_to_role(
        &self,
        role_name: &str,
        permission_name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<()> {
        let role = self.store.find_or_create_role(role_name, guard, scope).await?;
        let permission = self
            .store
            .find_or_create_permission(permission_name, guard)
            .await?;
        self.store
            .attach_permission_to_role(role.id, permission.id)
            .await?;
        self.cache.flush();
        Ok(())
    }

    /// Detaches `permission_name` from `role_name`. A missing role or
    /// permission makes this a no-op.
    #[instrument(skip(self))]
    pub async fn revoke_permission_from_role(
        &self,
        role_name: &str,
        permission_name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<()> {
        let role = self.store.find_role(role_name, guard, scope).await?;
        let permission = self.store.find_permission(permission_name, guard).await?;
        if let (Some(role), Some(permission)) = (role, permission) {
            self.store
                .detach_permission_from_role(role.id, permission.id)
                .await?;
        }
        self.cache.flush();
        Ok(())
    }

    /// Replaces the role's permission set with exactly `permission_names`.
    ///
    /// The role is created when missing. Listed permissions are resolved by
    /// name; missing names are skipped, not created.
    #[instrument(skip(self, permission_names), fields(count = permission_names.len()))]
    pub async fn sync_permissions_for_role(
        &self,
        role_name: &str,
        permission_names: &[&str],
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<()> {
        let role = self.store.find_or_create_role(role_name, guard, scope).await?;
        let names: Vec<String> = permission_names.iter().map(|name| name.to_string()).collect();
        let permissions = self.store.find_permissions_by_names(&names, guard).await?;
        let ids: Vec<i64> = permissions.iter().map(|permission| permission.id).collect();
        self.store.replace_role_permissions(role.id, &ids).await?;
        self.cache.flush();
        Ok(())
    }

    /// Replaces the subject's role set with exactly `role_names`.
    ///
    /// Listed roles are resolved within the guard and scope; missing names
    /// are skipped, not created.
    #[instrument(skip(self, role_names), fields(subject = %subject, count = role_names.len()))]
    pub async fn sync_roles(
        &self,
        subject: &Subject,
        role_names: &[&str],
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<()> {
        let names: Vec<String> = role_names.iter().map(|name| name.to_string()).collect();
        let roles = self.store.find_roles_by_names(&names, guard, scope).await?;
        let ids: Vec<i64> = roles.iter().map(|role| role.id).collect();
        self.store.replace_subject_roles(subject, &ids).await?;
        self.cache.flush();
        Ok(())
    }

    /// Assigns a role to a subject, creating the role when missing.
    #[instrument(skip(self), fields(subject = %subject))]
    pub async fn assign_role(
        &self,
        subject: &Subject,
        role_name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<()> {
        let role = self.store.find_or_create_role(role_name, guard, scope).await?;
        self.store.attach_role_to_subject(subject, role.id).await?;
        self.cache.flush();
        Ok(())
    }

    /// Removes a role from a subject. A missing role makes this a no-op.
    #[instrument(skip(self), fields(subject = %subject))]
    pub async fn remove_role(
        &self,
        subject: &Subject,
        role_name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<()> {
        if let Some(role) = self.store.find_role(role_name, guard, scope).await? {
            self.store.detach_role_from_subject(subject, role.id).await?;
        }
        self.cache.flush();
        Ok(())
    }

    /// Grants a permission directly to a subject, bypassing roles. The
    /// permission is created when missing.
    #[instrument(skip(self), fields(subject = %subject))]
    pub async fn give_permission_to_model(
        &self,
        subject: &Subject,
        permission_name: &str,
        guard: &str,
    ) -> RbacResult<()> {
        let permission = self
            .store
            .find_or_create_permission(permission_name, guard)
            .await?;
        self.store
            .attach_permission_to_subject(subject, permission.id)
            .await?;
        self.cache.flush();
        Ok(())
    }

    /// Revokes a direct grant. A missing permission makes this a no-op.
    #[instrument(skip(self), fields(subject = %subject))]
    pub async fn revoke_permission_from_model(
        &self,
        subject: &Subject,
        permission_name: &str,
        guard: &str,
    ) -> RbacResult<()> {
        if let Some(permission) = self.store.find_permission(permission_name, guard).await? {
            self.store
                .detach_permission_from_subject(subject, permission.id)
                .await?;
        }
        self.cache.flush();
        Ok(())
    }

    /// Replaces the subject's direct grants with exactly `permission_names`
    /// (resolved, not created).
    #[instrument(skip(self, permission_names), fields(subject = %subject, count = permission_names.len()))]
    pub async fn sync_permissions_for_model(
        &self,
        subject: &Subject,
        permission_names: &[&str],
        guard: &str,
    ) -> RbacResult<()> {
        let names: Vec<String> = permission_names.iter().map(|name| name.to_string()).collect();
        let permissions = self.store.find_permissions_by_names(&names, guard).await?;
        let ids: Vec<i64> = permissions.iter().map(|permission| permission.id).collect();
        self.store.replace_subject_permissions(subject, &ids).await?;
        self.cache.flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_storage::MemoryRbacStore;

    fn engine() -> RbacEngine<MemoryRbacStore> {
        RbacEngine::new(MemoryRbacStore::new_shared())
    }

    #[tokio::test]
    async fn test_give_permission_creates_both_endpoints() {
        let engine = engine();
        let scope = TenantScope::global();

        engine
            .give_permission_to_role("editor", "publish", "web", &scope)
            .await
            .unwrap();

        assert!(engine.find_role("editor", "web", &scope).await.unwrap().is_some());
        assert!(engine.find_permission("publish", "web").await.unwrap().is_some());
        assert_eq!(engine.store().list_role_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_with_missing_endpoints_is_a_noop() {
        let engine = engine();
        let scope = TenantScope::global();

        engine
            .revoke_permission_from_role("ghost", "publish", "web", &scope)
            .await
            .unwrap();
        assert!(engine.store().list_roles().await.unwrap().is_empty());
        assert!(engine.store().list_permissions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_permissions_for_role_skips_unknown_names() {
        let engine = engine();
        let scope = TenantScope::global();
        engine.find_or_create_permission("read", "web").await.unwrap();

        engine
            .sync_permissions_for_role("editor", &["read", "never-created"], "web", &scope)
            .await
            .unwrap();

        let edges = engine.store().list_role_permissions().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].permission.name, "read");
        // The unknown name was not created as a side effect.
        assert_eq!(engine.store().list_permissions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_roles_replaces_the_exact_set() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);
        for name in ["a", "b", "c"] {
            engine.find_or_create_role(name, "web", &scope).await.unwrap();
        }
        engine.assign_role(&subject, "a", "web", &scope).await.unwrap();

        engine.sync_roles(&subject, &["b", "c"], "web", &scope).await.unwrap();

        assert!(!engine.has_role(&subject, "a", "web", &scope).await.unwrap());
        assert!(engine.has_role(&subject, "b", "web", &scope).await.unwrap());
        assert!(engine.has_role(&subject, "c", "web", &scope).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_role_detaches_but_keeps_the_role() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);
        engine.assign_role(&subject, "editor", "web", &scope).await.unwrap();

        engine.remove_role(&subject, "editor", "web", &scope).await.unwrap();

        assert!(!engine.has_role(&subject, "editor", "web", &scope).await.unwrap());
        assert!(engine.find_role("editor", "web", &scope).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_permissions_for_model_replaces_direct_grants() {
        let engine = engine();
        let subject = Subject::user(9);
        for name in ["read", "write"] {
            engine.find_or_create_permission(name, "web").await.unwrap();
        }
        engine.give_permission_to_model(&subject, "read", "web").await.unwrap();

        engine
            .sync_permissions_for_model(&subject, &["write"], "web")
            .await
            .unwrap();

        assert!(!engine.has_permission(&subject, "read", "web").await.unwrap());
        assert!(engine.has_permission(&subject, "write", "web").await.unwrap());
    }
}
