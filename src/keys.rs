//! Deterministic key derivation for rate limiting, attempt tracking, and
//! token blacklisting.
//!
//! Keys are fixed-delimiter concatenations so the same inputs always map to
//! the same key in whatever store backs them.

use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

/// Truncated-hash length for the token id fallback.
const TOKEN_ID_HASH_LEN: usize = 16;

/// `rate_limit:<action>:<identifier>`
#[must_use]
pub fn rate_limit_key(identifier: &str, action: &str) -> String {
    format!("rate_limit:{action}:{identifier}")
}

/// `attempts:<action>:<identifier>`
#[must_use]
pub fn attempt_key(identifier: &str, action: &str) -> String {
    format!("attempts:{action}:{identifier}")
}

/// `blacklist:<tokenId>`
#[must_use]
pub fn blacklist_key(token_id: &str) -> String {
    format!("blacklist:{token_id}")
}

/// Derive a stable identifier for a token, for blacklist keys.
///
/// Prefers the embedded `jti` claim, read without verifying the signature
/// (blacklisting must work for tokens we would reject). Tokens without a
/// `jti` fall back to a truncated SHA-256 of the raw string, so the same
/// token always maps to the same id.
#[must_use]
pub fn extract_token_id(token: &str) -> String {
    if let Some(jti) = decode_jti(token) {
        return jti;
    }
    let digest = Sha256::digest(token.as_bytes());
    let mut hashed = hex::encode(digest);
    hashed.truncate(TOKEN_ID_HASH_LEN);
    hashed
}

fn decode_jti(token: &str) -> Option<String> {
    let mut parts = token.split('.');
    let _header = parts.next()?;
    let claims_b64 = parts.next()?;
    parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let bytes = Base64UrlUnpadded::decode_vec(claims_b64).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims
        .get("jti")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
