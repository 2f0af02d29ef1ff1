//! # Transita Auth (shared authorization core)
//!
//! `transita-auth` is the shared authentication and authorization package
//! of the Transita bus platform. Services embed it to issue and verify
//! tokens and to answer authorization questions; persistence stays with the
//! embedding service behind the typed interfaces in [`store`].
//!
//! ## Role Model
//!
//! Roles form a forest: each role has at most one parent, and a role
//! inherits every permission attached to its ancestors. Assignments link a
//! user to a role, optionally scoped to a context (a route, a location, or
//! globally) and optionally expiring. Resolution flattens all of this into
//! an effective permission set; a cyclic parent chain is a data-integrity
//! fault and fails loudly.
//!
//! ## Tokens
//!
//! Access tokens embed the flattened role and permission names as a signed
//! snapshot; they are not re-checked against storage until refresh, so a
//! revoked permission stays usable until the access token expires. Refresh
//! tokens carry identity only and are signed with a distinct secret; a
//! `type` discriminator keeps the two from standing in for each other.
//! Verification failures are uniform: callers learn that a token is
//! invalid, never why.
//!
//! ## Contextual Checks
//!
//! Permissions flagged context-required cannot be answered from the
//! snapshot alone — the token does not record which scope a grant covers.
//! [`evaluator::check_contextual_permission`] consults a live lookup
//! collaborator for those, trading full offline checking for bounded token
//! size.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod hierarchy;
pub mod keys;
pub mod model;
pub mod secrets;
pub mod service;
pub mod store;
pub mod token;

pub use config::{DEFAULT_ACCESS_EXPIRY, DEFAULT_REFRESH_EXPIRY, TokenConfig, parse_expiry};
pub use error::{Error, TokenInvalid};
pub use evaluator::ContextLookup;
pub use hierarchy::{
    ResolvedPermissions, RoleCatalog, resolve_effective_permissions, validate_grant,
};
pub use model::{
    AccessClaims, AuthTokens, ContextType, Permission, RefreshClaims, Role, User,
    UserRoleAssignment, UserStatus, UserType,
};
pub use service::AuthService;
pub use store::{AuditEntry, AuditSink, NoopAuditSink};
pub use token::{TokenService, extract_bearer_token, should_refresh};
