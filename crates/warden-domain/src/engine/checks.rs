//! Permission and role checks, the cached `can` path and `authorize`.

use warden_storage::{RbacStore, Subject, TenantScope};

use crate::cache::DecisionKey;
use crate::error::RbacResult;

use super::RbacEngine;

impl<S: RbacStore> RbacEngine<S> {
    /// Whether the subject holds the role, resolved by its full identity.
    pub async fn has_role(
        &self,
        subject: &Subject,
        role_name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<bool> {
        match self.store.find_role(role_name, guard, scope).await? {
            Some(role) => Ok(self.store.subject_has_role(subject, role.id).await?),
            None => Ok(false),
        }
    }

    /// Whether the subject holds the permission by direct grant. Roles are
    /// not consulted; use [`can`](Self::can) for the effective check.
    pub async fn has_permission(
        &self,
        subject: &Subject,
        permission_name: &str,
        guard: &str,
    ) -> RbacResult<bool> {
        match self.store.find_permission(permission_name, guard).await? {
            Some(permission) => {
                Ok(self.store.subject_has_permission(subject, permission.id).await?)
            }
            None => Ok(false),
        }
    }

    /// Whether the subject holds at least one of `role_names`. Evaluated
    /// left to right, stopping at the first match.
    pub async fn has_any_role(
        &self,
        subject: &Subject,
        role_names: &[&str],
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<bool> {
        for role_name in role_names {
            if self.has_role(subject, role_name, guard, scope).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether the subject holds every one of `role_names`. Evaluated left
    /// to right, stopping at the first miss.
    pub async fn has_all_roles(
        &self,
        subject: &Subject,
        role_names: &[&str],
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<bool> {
        for role_name in role_names {
            if !self.has_role(subject, role_name, guard, scope).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether the subject holds at least one of `permission_names` by
    /// direct grant. Evaluated left to right, stopping at the first match.
    pub async fn has_any_permission(
        &self,
        subject: &Subject,
        permission_names: &[&str],
        guard: &str,
    ) -> RbacResult<bool> {
        for permission_name in permission_names {
            if self.has_permission(subject, permission_name, guard).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether the subject holds every one of `permission_names` by direct
    /// grant. Evaluated left to right, stopping at the first miss.
    pub async fn has_all_permissions(
        &self,
        subject: &Subject,
        permission_names: &[&str],
        guard: &str,
    ) -> RbacResult<bool> {
        for permission_name in permission_names {
            if !self.has_permission(subject, permission_name, guard).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The effective permission check: true when the subject holds the
    /// permission directly or through any of its roles.
    ///
    /// Consults the decision cache first when enabled, then runs stages and
    /// stops at the first decisive one: direct grant, the subject's role
    /// list, the permission row, the role-permission edges. Every stage
    /// outcome is cached.
    pub async fn can(
        &self,
        subject: &Subject,
        permission_name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<bool> {
        let key = DecisionKey::new(subject, permission_name, guard, scope);
        if let Some(allowed) = self.cache.get(&key) {
            return Ok(allowed);
        }

        if self.has_permission(subject, permission_name, guard).await? {
            self.cache.insert(key, true);
            return Ok(true);
        }

        // Scope participates in the cache key only. Role derivation walks
        // the subject's full role list; the roles carry their own scope.
        let role_ids = self.store.role_ids_for_subject(subject).await?;
        if role_ids.is_empty() {
            self.cache.insert(key, false);
            return Ok(false);
        }

        let Some(permission) = self.store.find_permission(permission_name, guard).await? else {
            self.cache.insert(key, false);
            return Ok(false);
        };

        let allowed = self
            .store
            .any_role_has_permission(&role_ids, permission.id)
            .await?;
        self.cache.insert(key, allowed);
        Ok(allowed)
    }

    /// Whether the subject holds the configured super admin role. Always
    /// false when no super admin role is configured.
    pub async fn is_super_admin(
        &self,
        subject: &Subject,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<bool> {
        let Some(role_name) = self.super_admin_role().await else {
            return Ok(false);
        };
        self.has_role(subject, &role_name, guard, scope).await
    }

    /// [`can`](Self::can) with the super admin bypass: a subject holding
    /// the configured super admin role is authorized for any ability.
    /// Plain `can` and `has_permission` never consult super admin.
    pub async fn authorize(
        &self,
        subject: &Subject,
        ability: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<bool> {
        if self.is_super_admin(subject, guard, scope).await? {
            return Ok(true);
        }
        self.can(subject, ability, guard, scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_storage::MemoryRbacStore;

    fn engine() -> RbacEngine<MemoryRbacStore> {
        RbacEngine::new(MemoryRbacStore::new_shared())
    }

    #[tokio::test]
    async fn test_has_role_resolves_by_full_identity() {
        let engine = engine();
        let subject = Subject::user(1);
        let org1 = TenantScope::of("Org", 1);

        engine.assign_role(&subject, "admin", "web", &org1).await.unwrap();

        assert!(engine.has_role(&subject, "admin", "web", &org1).await.unwrap());
        assert!(!engine
            .has_role(&subject, "admin", "web", &TenantScope::global())
            .await
            .unwrap());
        assert!(!engine.has_role(&subject, "admin", "api", &org1).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_permission_sees_direct_grants_only() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);

        engine
            .give_permission_to_role("editor", "publish", "web", &scope)
            .await
            .unwrap();
        engine.assign_role(&subject, "editor", "web", &scope).await.unwrap();

        assert!(!engine.has_permission(&subject, "publish", "web").await.unwrap());
        assert!(engine.can(&subject, "publish", "web", &scope).await.unwrap());
    }

    #[tokio::test]
    async fn test_combinators_over_roles() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);
        engine.assign_role(&subject, "editor", "web", &scope).await.unwrap();

        assert!(engine
            .has_any_role(&subject, &["viewer", "editor"], "web", &scope)
            .await
            .unwrap());
        assert!(!engine
            .has_any_role(&subject, &["viewer", "owner"], "web", &scope)
            .await
            .unwrap());
        assert!(engine.has_all_roles(&subject, &["editor"], "web", &scope).await.unwrap());
        assert!(!engine
            .has_all_roles(&subject, &["editor", "viewer"], "web", &scope)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_can_false_for_unknown_permission() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);
        engine.assign_role(&subject, "editor", "web", &scope).await.unwrap();

        assert!(!engine.can(&subject, "never-created", "web", &scope).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_reuses_the_cached_decision() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);
        engine
            .give_permission_to_role("editor", "publish", "web", &scope)
            .await
            .unwrap();
        engine.assign_role(&subject, "editor", "web", &scope).await.unwrap();
        engine.enable_cache(Duration::from_secs(60));

        assert!(engine.can(&subject, "publish", "web", &scope).await.unwrap());
        assert!(engine.can(&subject, "publish", "web", &scope).await.unwrap());

        let snapshot = engine.cache_metrics().snapshot();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
    }

    #[tokio::test]
    async fn test_authorize_equals_can_without_super_admin() {
        let engine = engine();
        let scope = TenantScope::global();
        let subject = Subject::user(1);

        assert!(!engine.authorize(&subject, "publish", "web", &scope).await.unwrap());

        engine.give_permission_to_model(&subject, "publish", "web").await.unwrap();
        assert!(engine.authorize(&subject, "publish", "web", &scope).await.unwrap());
    }
}
