//! Core identity and authorization records plus token claim shapes.
//!
//! `Role`, `Permission`, and `UserRoleAssignment` are long-lived records
//! owned by storage; claims and token pairs are ephemeral snapshots built
//! at issuance time and never mutated.

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator embedded in access token claims.
pub const TOKEN_TYPE_ACCESS: &str = "access";
/// Discriminator embedded in refresh token claims.
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Passenger,
    Driver,
    Dispatcher,
    Admin,
    ServiceAccount,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
    Deleted,
}

/// Platform account. The authorization core only reads id, email, and type;
/// the remaining fields are owned by the identity subsystem.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub status: UserStatus,
    pub email_verified: bool,
    pub phone_verified: bool,
}

/// A named bundle of permissions. Roles form a forest: at most one parent
/// per role, and the parent chain must stay acyclic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// Unique lowercase-underscore identifier, e.g. `senior_dispatcher`.
    pub name: String,
    pub display_name: String,
    pub parent_role_id: Option<Uuid>,
    pub is_system_role: bool,
    pub is_active: bool,
}

/// A capability named `resource.action`, e.g. `trip.assign`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    /// When set, a grant of this permission must be scoped to a context.
    pub context_required: bool,
}

/// Scope limiting where a role grant applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextType {
    Global,
    Route,
    Location,
}

impl ContextType {
    /// Parse the wire form (`GLOBAL` / `ROUTE` / `LOCATION`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GLOBAL" => Some(Self::Global),
            "ROUTE" => Some(Self::Route),
            "LOCATION" => Some(Self::Location),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Route => "ROUTE",
            Self::Location => "LOCATION",
        }
    }
}

/// Links a user to a role, optionally scoped and optionally expiring.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub context_type: Option<ContextType>,
    pub context_id: Option<String>,
    /// Unix seconds; `None` means the assignment never expires.
    pub expires_at: Option<i64>,
    pub is_active: bool,
}

impl UserRoleAssignment {
    /// A `context_id` without a `context_type` is malformed and never takes
    /// part in resolution.
    #[must_use]
    pub fn context_consistent(&self) -> bool {
        self.context_id.is_none() || self.context_type.is_some()
    }

    /// Whether the assignment grants anything at time `now` (unix seconds).
    #[must_use]
    pub fn is_effective(&self, now: i64) -> bool {
        self.is_active
            && self.context_consistent()
            && self.expires_at.map_or(true, |expires_at| expires_at > now)
    }

    /// The scope pair carried by this assignment, if any.
    #[must_use]
    pub fn context_pair(&self) -> Option<(ContextType, String)> {
        self.context_type
            .map(|context_type| (context_type, self.context_id.clone().unwrap_or_default()))
    }
}

/// Check a role name against the lowercase-underscore convention.
#[must_use]
pub fn valid_role_name(name: &str) -> bool {
    Regex::new(r"^[a-z][a-z0-9_]*$").is_ok_and(|regex| regex.is_match(name))
}

/// Check a permission name against the `resource.action` convention.
#[must_use]
pub fn valid_permission_name(name: &str) -> bool {
    Regex::new(r"^[a-z][a-z0-9_]*\.[a-z][a-z0-9_]*$").is_ok_and(|regex| regex.is_match(name))
}

/// Signed access token claims. A snapshot taken at issuance, not a live
/// view: the embedded role/permission names stay valid until `exp` even if
/// storage changes underneath.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    #[serde(rename = "type")]
    pub token_type: String,
    pub sub: Uuid,
    pub email: String,
    #[serde(rename = "userType")]
    pub user_type: UserType,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signed refresh token claims. Carries identity only; a refresh token must
/// never grant authorization by itself.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    #[serde(rename = "type")]
    pub token_type: String,
    pub sub: Uuid,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// The pair handed back to a freshly authenticated caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Always `Bearer`.
    pub token_type: String,
}
