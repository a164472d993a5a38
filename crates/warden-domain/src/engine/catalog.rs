//! Role and permission catalog operations.

use warden_storage::{RbacStore, TenantScope};

use crate::error::RbacResult;
use crate::model::{Permission, Role};

use super::RbacEngine;

impl<S: RbacStore> RbacEngine<S> {
    /// Finds a role by its full identity. `None` when absent.
    pub async fn find_role(
        &self,
        name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<Option<Role>> {
        Ok(self.store.find_role(name, guard, scope).await?)
    }

    /// Finds a role by identity, creating it when absent.
    ///
    /// Concurrent calls for the same identity converge on one row; creation
    /// races are resolved by the store's unique constraint and re-query.
    pub async fn find_or_create_role(
        &self,
        name: &str,
        guard: &str,
        scope: &TenantScope,
    ) -> RbacResult<Role> {
        Ok(self.store.find_or_create_role(name, guard, scope).await?)
    }

    /// Finds a permission by name and guard. `None` when absent.
    pub async fn find_permission(
        &self,
        name: &str,
        guard: &str,
    ) -> RbacResult<Option<Permission>> {
        Ok(self.store.find_permission(name, guard).await?)
    }

    /// Finds a permission, creating it when absent.
    pub async fn find_or_create_permission(
        &self,
        name: &str,
        guard: &str,
    ) -> RbacResult<Permission> {
        Ok(self.store.find_or_create_permission(name, guard).await?)
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
    async fn test_find_or_create_role_reuses_the_existing_row() {
        let engine = engine();
        let scope = TenantScope::global();

        let first = engine.find_or_create_role("editor", "web", &scope).await.unwrap();
        let second = engine.find_or_create_role("editor", "web", &scope).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(engine.store().list_roles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_role_returns_none_for_missing_identity() {
        let engine = engine();
        let scope = TenantScope::global();
        engine.find_or_create_role("editor", "web", &scope).await.unwrap();

        assert!(engine.find_role("editor", "api", &scope).await.unwrap().is_none());
        assert!(engine
            .find_role("editor", "web", &TenantScope::of("Org", 1))
            .await
            .unwrap()
            .is_none());
        assert!(engine.find_role("editor", "web", &scope).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_permission_catalog_roundtrip() {
        let engine = engine();

        assert!(engine.find_permission("publish", "web").await.unwrap().is_none());
        let created = engine.find_or_create_permission("publish", "web").await.unwrap();
        let found = engine.find_permission("publish", "web").await.unwrap().unwrap();
        assert_eq!(created.id, found.id);
    }
}
