//! Authorization checks over verified access claims.
//!
//! Plain checks are pure set membership against the embedded snapshot.
//! Context-required permissions are the exception: the snapshot does not
//! record which scope a grant was made for, so a contextual check consults
//! a live lookup collaborator refreshed from storage. Embedding the full
//! context data in every token would grow tokens without bound as
//! assignments grow; the trade-off is that scoped checks are not fully
//! offline.

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::error::Error;
use crate::model::{AccessClaims, ContextType, Permission};

/// Live view of the authorization state in storage, used only for
/// context-required permissions. Calls are awaited like any I/O and may
/// fail.
#[allow(async_fn_in_trait)]
pub trait ContextLookup {
    /// The permission record, including its `context_required` flag.
    async fn find_permission(&self, name: &str) -> Result<Option<Permission>>;

    /// The context pairs the permission currently holds for, freshly
    /// resolved from active assignments.
    async fn contexts_for(
        &self,
        user_id: Uuid,
        permission: &str,
    ) -> Result<Vec<(ContextType, String)>>;
}

#[must_use]
pub fn has_permission(claims: &AccessClaims, name: &str) -> bool {
    claims.permissions.iter().any(|held| held == name)
}

#[must_use]
pub fn has_role(claims: &AccessClaims, name: &str) -> bool {
    claims.roles.iter().any(|held| held == name)
}

#[must_use]
pub fn has_any_role(claims: &AccessClaims, names: &[&str]) -> bool {
    names.iter().any(|name| has_role(claims, name))
}

#[must_use]
pub fn has_all_roles(claims: &AccessClaims, names: &[&str]) -> bool {
    names.iter().all(|name| has_role(claims, name))
}

#[must_use]
pub fn has_any_permission(claims: &AccessClaims, names: &[&str]) -> bool {
    names.iter().any(|name| has_permission(claims, name))
}

#[must_use]
pub fn has_all_permissions(claims: &AccessClaims, names: &[&str]) -> bool {
    names.iter().all(|name| has_permission(claims, name))
}

/// Check a permission against a specific resource scope.
///
/// Permissions that are not context-required fall back to plain membership
/// in the claims (an unknown permission name does too; the snapshot is
/// authoritative for unscoped grants). For context-required permissions
/// membership stays necessary but is not sufficient: the snapshot cannot
/// say which scope a grant covers, so the live lookup must also confirm
/// the requested scope. A token issued before the grant existed never
/// passes on live state alone.
///
/// # Errors
///
/// Returns [`Error::MissingContextForCheck`] when the resource scope is
/// empty or not a known context type, and propagates lookup failures.
pub async fn check_contextual_permission<L: ContextLookup>(
    claims: &AccessClaims,
    name: &str,
    resource_type: &str,
    resource_id: &str,
    lookup: &L,
) -> Result<bool> {
    let permission = lookup
        .find_permission(name)
        .await
        .context("failed to look up permission")?;
    let context_required = permission.is_some_and(|permission| permission.context_required);
    if !context_required {
        return Ok(has_permission(claims, name));
    }

    if resource_type.trim().is_empty() || resource_id.trim().is_empty() {
        return Err(Error::MissingContextForCheck(name.to_string()).into());
    }
    let Some(context_type) = ContextType::parse(resource_type) else {
        return Err(Error::MissingContextForCheck(name.to_string()).into());
    };

    if !has_permission(claims, name) {
        return Ok(false);
    }

    let contexts = lookup
        .contexts_for(claims.sub, name)
        .await
        .context("failed to resolve live contexts")?;
    Ok(contexts.iter().any(|(granted_type, granted_id)| {
        *granted_type == ContextType::Global
            || (*granted_type == context_type && granted_id == resource_id)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TOKEN_TYPE_ACCESS, UserType};
    use std::collections::HashMap;

    fn claims(roles: &[&str], permissions: &[&str]) -> AccessClaims {
        AccessClaims {
            token_type: TOKEN_TYPE_ACCESS.to_string(),
            sub: Uuid::new_v4(),
            email: "driver@transita.dev".to_string(),
            user_type: UserType::Driver,
            roles: roles.iter().map(ToString::to_string).collect(),
            permissions: permissions.iter().map(ToString::to_string).collect(),
            iss: "iss".to_string(),
            aud: "aud".to_string(),
            jti: "jti".to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    struct FakeLookup {
        permissions: HashMap<String, Permission>,
        contexts: HashMap<String, Vec<(ContextType, String)>>,
    }

    impl FakeLookup {
        fn new() -> Self {
            Self {
                permissions: HashMap::new(),
                contexts: HashMap::new(),
            }
        }

        fn with_permission(mut self, name: &str, context_required: bool) -> Self {
            let (resource, action) = name.split_once('.').unwrap();
            self.permissions.insert(
                name.to_string(),
                Permission {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    resource: resource.to_string(),
                    action: action.to_string(),
                    context_required,
                },
            );
            self
        }

        fn with_context(mut self, name: &str, context_type: ContextType, id: &str) -> Self {
            self.contexts
                .entry(name.to_string())
                .or_default()
                .push((context_type, id.to_string()));
            self
        }
    }

    impl ContextLookup for FakeLookup {
        async fn find_permission(&self, name: &str) -> Result<Option<Permission>> {
            Ok(self.permissions.get(name).cloned())
        }

        async fn contexts_for(
            &self,
            _user_id: Uuid,
            permission: &str,
        ) -> Result<Vec<(ContextType, String)>> {
            Ok(self.contexts.get(permission).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn membership_checks() {
        let claims = claims(&["dispatcher"], &["trip.assign", "trip.view"]);

        assert!(has_permission(&claims, "trip.assign"));
        assert!(!has_permission(&claims, "trip.override"));
        assert!(has_role(&claims, "dispatcher"));
        assert!(!has_role(&claims, "admin"));
        assert!(has_any_role(&claims, &["admin", "dispatcher"]));
        assert!(!has_any_role(&claims, &["admin", "driver"]));
        assert!(has_all_roles(&claims, &["dispatcher"]));
        assert!(!has_all_roles(&claims, &["dispatcher", "admin"]));
        assert!(has_any_permission(&claims, &["trip.override", "trip.view"]));
        assert!(has_all_permissions(&claims, &["trip.assign", "trip.view"]));
        assert!(!has_all_permissions(&claims, &["trip.assign", "trip.override"]));
    }

    #[tokio::test]
    async fn non_contextual_permission_uses_snapshot() {
        let claims = claims(&[], &["trip.assign"]);
        let lookup = FakeLookup::new().with_permission("trip.assign", false);

        assert!(
            check_contextual_permission(&claims, "trip.assign", "ROUTE", "route-1", &lookup)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn contextual_permission_checks_live_scope() {
        let claims = claims(&[], &["route.edit"]);
        let lookup = FakeLookup::new()
            .with_permission("route.edit", true)
            .with_context("route.edit", ContextType::Route, "route-123");

        assert!(
            check_contextual_permission(&claims, "route.edit", "ROUTE", "route-123", &lookup)
                .await
                .unwrap()
        );
        assert!(
            !check_contextual_permission(&claims, "route.edit", "ROUTE", "route-456", &lookup)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn stale_snapshot_cannot_satisfy_contextual_check() {
        // The claims still carry the permission, but storage no longer
        // grants any scope for it.
        let claims = claims(&[], &["route.edit"]);
        let lookup = FakeLookup::new().with_permission("route.edit", true);

        assert!(
            !check_contextual_permission(&claims, "route.edit", "ROUTE", "route-123", &lookup)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn live_scope_alone_cannot_satisfy_without_membership() {
        // The token predates the grant: live state holds the scope, but the
        // snapshot never carried the permission. Membership stays necessary.
        let claims = claims(&[], &[]);
        let lookup = FakeLookup::new()
            .with_permission("route.edit", true)
            .with_context("route.edit", ContextType::Route, "route-123");

        assert!(
            !check_contextual_permission(&claims, "route.edit", "ROUTE", "route-123", &lookup)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn global_grant_satisfies_any_scope() {
        let claims = claims(&[], &["route.edit"]);
        let lookup = FakeLookup::new()
            .with_permission("route.edit", true)
            .with_context("route.edit", ContextType::Global, "");

        assert!(
            check_contextual_permission(&claims, "route.edit", "LOCATION", "depot-7", &lookup)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn empty_or_unknown_scope_is_an_error() {
        let claims = claims(&[], &["route.edit"]);
        let lookup = FakeLookup::new().with_permission("route.edit", true);

        let err = check_contextual_permission(&claims, "route.edit", "", "route-1", &lookup)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingContextForCheck(_))
        ));

        let err = check_contextual_permission(&claims, "route.edit", "FLEET", "f-1", &lookup)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingContextForCheck(_))
        ));
    }
}
