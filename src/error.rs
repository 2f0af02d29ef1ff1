//! Error taxonomy for the authorization core.
//!
//! Verification failures are deliberately collapsed into the reason-free
//! [`TokenInvalid`] so callers never learn whether a token was forged,
//! expired, or addressed to the wrong audience. Configuration and
//! hierarchy-integrity faults keep their detail: they indicate a broken
//! invariant, not a user mistake.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed expiry duration string at configuration time.
    #[error("invalid duration format: {0:?}")]
    InvalidDurationFormat(String),
    /// A role's parent chain loops back on itself.
    #[error("cyclic role hierarchy involving role {0}")]
    CyclicRoleHierarchy(Uuid),
    /// A context-required permission was granted without a context.
    #[error("permission {0:?} requires a context")]
    ContextRequiredButMissing(String),
    /// A contextual permission check lacked the information to resolve.
    #[error("missing context for check on permission {0:?}")]
    MissingContextForCheck(String),
}

/// Uniform negative outcome of token verification. Carries no reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid token")]
pub struct TokenInvalid;
