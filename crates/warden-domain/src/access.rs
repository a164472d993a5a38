//! Gate helpers for request handling.
//!
//! Route definitions commonly carry a pipe-separated list of names, e.g.
//! `"admin|editor"`. [`AccessRule`] parses that form, and the free
//! functions answer whether a subject passes the gate.

use warden_storage::{RbacStore, Subject, TenantScope};

use crate::engine::RbacEngine;
use crate::error::RbacResult;

/// A pipe-separated list of role or permission names. A rule matches when
/// any single name does; an empty rule matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    names: Vec<String>,
}

impl AccessRule {
    /// Parses a rule, trimming whitespace and dropping empty segments.
    pub fn parse(raw: &str) -> Self {
        let names = raw
            .split('|')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<&str> for AccessRule {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Vec<String>> for AccessRule {
    fn from(names: Vec<String>) -> Self {
        Self { names }
    }
}

/// True when the subject holds any role named by the rule.
pub async fn require_role<S: RbacStore>(
    engine: &RbacEngine<S>,
    subject: &Subject,
    rule: &AccessRule,
    guard: &str,
    scope: &TenantScope,
) -> RbacResult<bool> {
    for name in rule.names() {
        if engine.has_role(subject, name, guard, scope).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// True when the subject effectively holds any permission named by the
/// rule, directly or through a role.
pub async fn require_permission<S: RbacStore>(
    engine: &RbacEngine<S>,
    subject: &Subject,
    rule: &AccessRule,
    guard: &str,
    scope: &TenantScope,
) -> RbacResult<bool> {
    for name in rule.names() {
        if engine.can(subject, name, guard, scope).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// True when any name in the rule matches as a role or as an effective
/// permission. Each name is tried as a role first.
pub async fn role_or_permission<S: RbacStore>(
    engine: &RbacEngine<S>,
    subject: &Subject,
    rule: &AccessRule,
    guard: &str,
    scope: &TenantScope,
) -> RbacResult<bool> {
    for name in rule.names() {
        if engine.has_role(subject, name, guard, scope).await?
            || engine.can(subject, name, guard, scope).await?
        {
            return Ok(true);
        }
    }
    Ok(false)
}
