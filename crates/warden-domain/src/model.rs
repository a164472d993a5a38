//! Domain model types and the consumer subject trait.
//!
//! Roles, permissions, subjects and tenant scopes are defined in
//! `warden-storage` and re-exported here under their domain names.

pub use warden_storage::{
    PermissionRecord as Permission, RoleRecord as Role, Subject, TenantScope, DEFAULT_SUBJECT_KIND,
};

/// Guard used when callers do not choose one.
pub const DEFAULT_GUARD: &str = "web";

/// Implemented by application model types that can hold roles and
/// permissions.
///
/// The engine never sees the application type itself; it sees the erased
/// [`Subject`] pair. Implementing this trait fixes the kind string in one
/// place so every call site converts the same way:
///
/// ```
/// use warden_domain::model::{RbacSubject, Subject};
///
/// struct Customer {
///     id: i64,
/// }
///
/// impl RbacSubject for Customer {
///     const KIND: &'static str = "customer";
///
///     fn subject_id(&self) -> i64 {
///         self.id
///     }
/// }
///
/// let subject = Customer { id: 7 }.subject();
/// assert_eq!(subject, Subject::new("customer", 7));
/// ```
pub trait RbacSubject {
    /// Kind discriminator stored in the polymorphic edge tables.
    const KIND: &'static str;

    /// Row id of this entity within its kind.
    fn subject_id(&self) -> i64;

    /// The erased subject reference the engine operates on.
    fn subject(&self) -> Subject {
        Subject::new(Self::KIND, self.subject_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Admin {
        id: i64,
    }

    impl RbacSubject for Admin {
        const KIND: &'static str = "admin";

        fn subject_id(&self) -> i64 {
            self.id
        }
    }

    #[test]
    fn test_subject_trait_erases_to_kind_and_id() {
        let subject = Admin { id: 3 }.subject();
        assert_eq!(subject.kind, "admin");
        assert_eq!(subject.id, 3);
    }

    #[test]
    fn test_default_guard_matches_default_subject_kind_convention() {
        assert_eq!(DEFAULT_GUARD, "web");
        assert_eq!(DEFAULT_SUBJECT_KIND, "user");
    }
}
