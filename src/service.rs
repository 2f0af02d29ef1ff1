//! Login and refresh orchestration.
//!
//! Flow Overview: fetch the user's active assignments and the role graph,
//! resolve the effective permission set, and issue a token pair embedding
//! the flattened snapshot. Refresh verifies the refresh token, re-resolves
//! from storage (so rotations pick up revocations), and issues a new pair.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use crate::error::TokenInvalid;
use crate::hierarchy::resolve_effective_permissions;
use crate::model::{AuthTokens, User, UserStatus};
use crate::store::{
    AssignmentStore, AuditEntry, AuditSink, RoleStore, UserStore, record_best_effort,
};
use crate::token::TokenService;

/// Ties the token service to the persistence collaborators.
pub struct AuthService<S, A> {
    tokens: TokenService,
    store: S,
    audit: A,
}

impl<S, A> AuthService<S, A>
where
    S: UserStore + RoleStore + AssignmentStore,
    A: AuditSink,
{
    #[must_use]
    pub fn new(tokens: TokenService, store: S, audit: A) -> Self {
        Self {
            tokens,
            store,
            audit,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Issue a token pair for an already-authenticated user.
    ///
    /// # Errors
    ///
    /// Propagates storage failures and hierarchy-integrity faults; a cyclic
    /// role graph surfaces here rather than being silently resolved.
    pub async fn authenticate(&self, user: &User) -> Result<AuthTokens> {
        let pair = self.issue_snapshot(user).await;
        record_best_effort(
            &self.audit,
            AuditEntry::of("login", "auth")
                .with_user(user.id)
                .with_success(pair.is_ok()),
        )
        .await;
        pair
    }

    /// Rotate a token pair from a refresh token.
    ///
    /// The new access token embeds a fresh snapshot resolved from storage.
    ///
    /// # Errors
    ///
    /// An invalid refresh token, an unknown subject, or a non-active user
    /// all surface as the uniform [`TokenInvalid`]; storage failures keep
    /// their detail.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let user = self
            .store
            .user(claims.sub)
            .await
            .context("failed to fetch user")?
            .ok_or(TokenInvalid)?;
        if user.status != UserStatus::Active {
            debug!("refresh rejected for non-active user {}", user.id);
            return Err(TokenInvalid.into());
        }

        let pair = self.issue_snapshot(&user).await;
        record_best_effort(
            &self.audit,
            AuditEntry::of("token_refresh", "auth")
                .with_user(user.id)
                .with_success(pair.is_ok()),
        )
        .await;
        pair
    }

    async fn issue_snapshot(&self, user: &User) -> Result<AuthTokens> {
        let assignments = self
            .store
            .active_assignments(user.id)
            .await
            .context("failed to fetch role assignments")?;
        let catalog = self.store.catalog().await.context("failed to load role catalog")?;

        let now = Utc::now().timestamp();
        let resolved = resolve_effective_permissions(user.id, &assignments, &catalog, now)?;
        self.tokens.issue_token_pair_at(
            user,
            resolved.role_names(),
            resolved.permission_names(),
            now,
        )
    }
}
