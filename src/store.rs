//! Persistence collaborator interfaces.
//!
//! The core never talks to a database directly; it consumes one typed
//! read-interface per entity plus an append-only audit sink. Implementations
//! live with the embedding service. Audit failures are logged and swallowed:
//! a broken audit pipeline must never abort the operation it describes.

use anyhow::Result;
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::hierarchy::RoleCatalog;
use crate::model::{Permission, Role, User, UserRoleAssignment};

/// Read access to user records. The core only consumes id, email, and type.
#[allow(async_fn_in_trait)]
pub trait UserStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>>;
}

/// Read access to the role graph.
#[allow(async_fn_in_trait)]
pub trait RoleStore {
    async fn role(&self, id: Uuid) -> Result<Option<Role>>;

    /// The full graph plus per-role grants, loaded for resolution.
    async fn catalog(&self) -> Result<RoleCatalog>;
}

/// Read access to the permission catalog.
#[allow(async_fn_in_trait)]
pub trait PermissionStore {
    async fn permission(&self, name: &str) -> Result<Option<Permission>>;
}

/// Read access to role assignments.
#[allow(async_fn_in_trait)]
pub trait AssignmentStore {
    /// Active assignments for a user. Expiry filtering still happens in the
    /// resolver against its own `now`.
    async fn active_assignments(&self, user_id: Uuid) -> Result<Vec<UserRoleAssignment>>;
}

/// One append-only audit record.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
}

impl AuditEntry {
    /// A minimal successful entry; the rest of the fields default to `None`.
    #[must_use]
    pub fn of(action: &str, resource: &str) -> Self {
        Self {
            user_id: None,
            action: action.to_string(),
            resource: resource.to_string(),
            resource_id: None,
            before: None,
            after: None,
            ip_address: None,
            user_agent: None,
            success: true,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }
}

/// Append-only audit log sink.
#[allow(async_fn_in_trait)]
pub trait AuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Deliberate no-op sink for tests and tooling.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    async fn record(&self, _entry: AuditEntry) -> Result<()> {
        Ok(())
    }
}

/// Record an audit entry, logging and swallowing any sink failure.
pub async fn record_best_effort<A: AuditSink>(sink: &A, entry: AuditEntry) {
    let action = entry.action.clone();
    if let Err(err) = sink.record(entry).await {
        error!("audit sink failed for action {action:?}: {err:#}");
    }
}
