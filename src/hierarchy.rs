//! Role hierarchy resolution.
//!
//! Flow Overview: take a user's role assignments, keep only the effective
//! ones, and walk each role's parent chain collecting the permissions
//! attached to every visited role. The walk carries a visited set; a
//! revisited role means the stored hierarchy is corrupt and resolution
//! fails with [`Error::CyclicRoleHierarchy`] instead of looping.
//!
//! Resolution is pure: storage and the clock only enter through the
//! arguments.

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::model::{ContextType, Permission, Role, UserRoleAssignment};

/// The full role graph plus per-role direct permission grants, as loaded
/// from storage.
#[derive(Debug, Default, Clone)]
pub struct RoleCatalog {
    roles: HashMap<Uuid, Role>,
    grants: HashMap<Uuid, Vec<Permission>>,
}

impl RoleCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role(&mut self, role: Role) {
        self.roles.insert(role.id, role);
    }

    /// Attach a permission directly to a role.
    pub fn grant(&mut self, role_id: Uuid, permission: Permission) {
        self.grants.entry(role_id).or_default().push(permission);
    }

    #[must_use]
    pub fn role(&self, id: Uuid) -> Option<&Role> {
        self.roles.get(&id)
    }

    fn permissions_of(&self, id: Uuid) -> &[Permission] {
        self.grants.get(&id).map_or(&[], Vec::as_slice)
    }
}

/// Output of resolution: the unique effective permission names, the role
/// names visited along the way, and the context pairs each
/// context-required permission holds for.
#[derive(Debug, Default, Clone)]
pub struct ResolvedPermissions {
    permissions: HashSet<String>,
    roles: HashSet<String>,
    contexts: HashMap<String, HashSet<(ContextType, String)>>,
}

impl ResolvedPermissions {
    #[must_use]
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Context pairs for a context-required permission, if it is held.
    #[must_use]
    pub fn contexts_for(&self, permission: &str) -> Option<&HashSet<(ContextType, String)>> {
        self.contexts.get(permission)
    }

    /// Whether the permission holds for the given scope. A `GLOBAL`-scoped
    /// grant applies everywhere.
    #[must_use]
    pub fn holds_in_context(
        &self,
        permission: &str,
        context_type: ContextType,
        context_id: &str,
    ) -> bool {
        self.contexts.get(permission).is_some_and(|pairs| {
            pairs.iter().any(|(granted_type, granted_id)| {
                *granted_type == ContextType::Global
                    || (*granted_type == context_type && granted_id == context_id)
            })
        })
    }

    /// Flattened permission names, sorted for stable claims.
    #[must_use]
    pub fn permission_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.permissions.iter().cloned().collect();
        names.sort();
        names
    }

    /// Flattened role names, sorted for stable claims.
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.iter().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }
}

/// Compute the effective permission set for `user_id` at time `now`.
///
/// Only effective assignments count: active, unexpired, and with a
/// consistent context. Permissions flagged `context_required` enter the set
/// only through assignments that carry a context, and their granting scopes
/// are collected for later contextual checks. Inactive roles end the walk:
/// neither they nor their ancestors grant anything through that chain.
///
/// # Errors
///
/// Returns [`Error::CyclicRoleHierarchy`] when a parent chain revisits a
/// role. This is a data-integrity fault for the administrative layer, never
/// silently resolved.
pub fn resolve_effective_permissions(
    user_id: Uuid,
    assignments: &[UserRoleAssignment],
    catalog: &RoleCatalog,
    now: i64,
) -> Result<ResolvedPermissions, Error> {
    let mut resolved = ResolvedPermissions::default();

    for assignment in assignments {
        if assignment.user_id != user_id || !assignment.is_effective(now) {
            continue;
        }

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut current = Some(assignment.role_id);
        while let Some(role_id) = current {
            if !visited.insert(role_id) {
                return Err(Error::CyclicRoleHierarchy(role_id));
            }
            let Some(role) = catalog.role(role_id) else {
                // Dangling role reference; the assignment grants nothing
                // beyond what was already collected.
                warn!("assignment {} references unknown role {role_id}", assignment.id);
                break;
            };
            if !role.is_active {
                break;
            }

            resolved.roles.insert(role.name.clone());
            for permission in catalog.permissions_of(role_id) {
                if permission.context_required {
                    let Some(pair) = assignment.context_pair() else {
                        continue;
                    };
                    resolved.permissions.insert(permission.name.clone());
                    resolved
                        .contexts
                        .entry(permission.name.clone())
                        .or_default()
                        .insert(pair);
                } else {
                    resolved.permissions.insert(permission.name.clone());
                }
            }
            current = role.parent_role_id;
        }
    }

    debug!(
        %user_id,
        permissions = resolved.permissions.len(),
        roles = resolved.roles.len(),
        "resolved effective permissions"
    );
    Ok(resolved)
}

/// Validate a prospective grant before it is persisted.
///
/// # Errors
///
/// Returns [`Error::ContextRequiredButMissing`] when a context-required
/// permission would be granted through a context-free assignment.
pub fn validate_grant(
    permission: &Permission,
    assignment: &UserRoleAssignment,
) -> Result<(), Error> {
    if permission.context_required && assignment.context_type.is_none() {
        return Err(Error::ContextRequiredButMissing(permission.name.clone()));
    }
    Ok(())
}
