//! Trait-level integration tests, run against the in-memory backend.
//!
//! These exercise the RbacStore contract end to end: identity partitioning,
//! idempotent edges, transactional replace semantics, and cascades.

use warden_storage::{MemoryRbacStore, RbacStore, Subject, TenantScope};

// Test: full grant chain is visible through the trait surface
#[tokio::test]
async fn test_grant_chain_round_trip() {
    let store = MemoryRbacStore::new();
    let subject = Subject::user(1);
    let scope = TenantScope::global();

    let role = store.find_or_create_role("editor", "web", &scope).await.unwrap();
    let permission = store
        .find_or_create_permission("publish", "web")
        .await
        .unwrap();

    store
        .attach_permission_to_role(role.id, permission.id)
        .await
        .unwrap();
    store.attach_role_to_subject(&subject, role.id).await.unwrap();

    let role_ids = store.role_ids_for_subject(&subject).await.unwrap();
    assert_eq!(role_ids, vec![role.id]);
    assert!(store
        .any_role_has_permission(&role_ids, permission.id)
        .await
        .unwrap());
}

// Test: re-running the same writes changes no row counts
#[tokio::test]
async fn test_writes_are_idempotent() {
    let store = MemoryRbacStore::new();
    let subject = Subject::user(1);
    let scope = TenantScope::global();

    for _ in 0..3 {
        let role = store.find_or_create_role("editor", "web", &scope).await.unwrap();
        let permission = store
            .find_or_create_permission("publish", "web")
            .await
            .unwrap();
        store
            .attach_permission_to_role(role.id, permission.id)
            .await
            .unwrap();
        store.attach_role_to_subject(&subject, role.id).await.unwrap();
        store
            .attach_permission_to_subject(&subject, permission.id)
            .await
            .unwrap();
    }

    assert_eq!(store.list_roles().await.unwrap().len(), 1);
    assert_eq!(store.list_permissions().await.unwrap().len(), 1);
    assert_eq!(store.list_role_permissions().await.unwrap().len(), 1);
    assert_eq!(store.list_subject_roles().await.unwrap().len(), 1);
    assert_eq!(store.list_subject_permissions().await.unwrap().len(), 1);
}

// Test: replace semantics across all three edge types
#[tokio::test]
async fn test_replace_operations() {
    let store = MemoryRbacStore::new();
    let subject = Subject::user(7);
    let scope = TenantScope::global();

    let editor = store.find_or_create_role("editor", "web", &scope).await.unwrap();
    let viewer = store.find_or_create_role("viewer", "web", &scope).await.unwrap();
    let read = store.find_or_create_permission("read", "web").await.unwrap();
    let write = store.find_or_create_permission("write", "web").await.unwrap();

    store
        .replace_role_permissions(editor.id, &[read.id, write.id])
        .await
        .unwrap();
    store
        .replace_subject_roles(&subject, &[editor.id, viewer.id])
        .await
        .unwrap();
    store
        .replace_subject_permissions(&subject, &[read.id])
        .await
        .unwrap();

    assert_eq!(store.list_role_permissions().await.unwrap().len(), 2);
    assert_eq!(store.role_ids_for_subject(&subject).await.unwrap().len(), 2);
    assert!(store.subject_has_permission(&subject, read.id).await.unwrap());

    // Shrink each set and verify the delta
    store.replace_role_permissions(editor.id, &[read.id]).await.unwrap();
    store.replace_subject_roles(&subject, &[viewer.id]).await.unwrap();
    store.replace_subject_permissions(&subject, &[]).await.unwrap();

    assert_eq!(store.list_role_permissions().await.unwrap().len(), 1);
    assert_eq!(
        store.role_ids_for_subject(&subject).await.unwrap(),
        vec![viewer.id]
    );
    assert!(!store.subject_has_permission(&subject, read.id).await.unwrap());
}

// Test: subjects of different kinds do not share edges
#[tokio::test]
async fn test_subject_kind_isolation() {
    let store = MemoryRbacStore::new();
    let user = Subject::user(1);
    let admin = Subject::new("admin", 1);

    let role = store
        .find_or_create_role("auditor", "web", &TenantScope::global())
        .await
        .unwrap();
    store.attach_role_to_subject(&user, role.id).await.unwrap();

    assert!(store.subject_has_role(&user, role.id).await.unwrap());
    assert!(!store.subject_has_role(&admin, role.id).await.unwrap());
}

// Test: deleting catalog rows cascades and is idempotent
#[tokio::test]
async fn test_delete_then_redelete() {
    let store = MemoryRbacStore::new();
    let scope = TenantScope::of("Org", 1);

    let role = store.find_or_create_role("admin", "web", &scope).await.unwrap();
    let permission = store.find_or_create_permission("manage", "web").await.unwrap();
    store
        .attach_permission_to_role(role.id, permission.id)
        .await
        .unwrap();

    assert_eq!(store.delete_roles(&[role.id]).await.unwrap(), 1);
    assert_eq!(store.delete_roles(&[role.id]).await.unwrap(), 0);
    assert!(store.list_role_permissions().await.unwrap().is_empty());

    // The same identity can be recreated afterwards, with a fresh id
    let recreated = store.find_or_create_role("admin", "web", &scope).await.unwrap();
    assert_ne!(recreated.id, role.id);
}
