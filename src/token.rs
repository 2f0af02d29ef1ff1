//! Token issuance and verification.
//!
//! Tokens are HS256 JWTs assembled by hand: base64url(header).base64url(claims)
//! signed with HMAC-SHA256. Access and refresh tokens use distinct secrets
//! and carry a `type` discriminator so neither can stand in for the other.
//!
//! Verification failures keep their detail inside the crate for logging;
//! the public surface collapses every reason into [`TokenInvalid`].

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::{DEFAULT_REFRESH_THRESHOLD_SECONDS, TokenConfig};
use crate::error::TokenInvalid;
use crate::model::{
    AccessClaims, AuthTokens, RefreshClaims, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH, User,
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Internal verification failure reasons. Never exposed to callers of the
/// service API; see [`TokenInvalid`].
#[derive(Debug, Error)]
pub(crate) enum TokenError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("token expired")]
    Expired,
    #[error("wrong token type")]
    WrongTokenType,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256 signed token from arbitrary claims.
pub(crate) fn sign_hs256<T: Serialize>(secret: &[u8], claims: &T) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(mac.finalize().into_bytes().as_slice());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token's structure and signature and decode its claims.
///
/// Claim validation (issuer, audience, expiry, type) is the caller's job;
/// this only proves the token was minted with `secret`.
pub(crate) fn verify_hs256<T: for<'de> Deserialize<'de>>(
    token: &str,
    secret: &[u8],
) -> Result<T, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(TokenError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(TokenError::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(TokenError::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    // Constant-time comparison via the Mac trait.
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    b64d_json(claims_b64)
}

/// Issues and verifies the platform's access/refresh token pairs.
///
/// Holds a shared, immutable [`TokenConfig`]; cloning is cheap and
/// concurrent use needs no synchronization.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
}

impl TokenService {
    #[must_use]
    pub fn new(config: Arc<TokenConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue an access/refresh pair with `iat` = now.
    ///
    /// The access token embeds the flattened role and permission names as a
    /// snapshot; it is never re-checked against storage until refresh.
    ///
    /// # Errors
    ///
    /// Returns an error only when claim serialization fails, which indicates
    /// a bug rather than a runtime condition.
    pub fn issue_token_pair(
        &self,
        user: &User,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> anyhow::Result<AuthTokens> {
        self.issue_token_pair_at(user, roles, permissions, Utc::now().timestamp())
    }

    /// [`Self::issue_token_pair`] with an explicit issuance instant.
    pub fn issue_token_pair_at(
        &self,
        user: &User,
        roles: Vec<String>,
        permissions: Vec<String>,
        now: i64,
    ) -> anyhow::Result<AuthTokens> {
        let access_ttl = self.config.access_ttl_seconds();
        let access = AccessClaims {
            token_type: TOKEN_TYPE_ACCESS.to_string(),
            sub: user.id,
            email: user.email.clone(),
            user_type: user.user_type,
            roles,
            permissions,
            iss: self.config.issuer().to_string(),
            aud: self.config.audience().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + access_ttl,
        };
        let refresh = RefreshClaims {
            token_type: TOKEN_TYPE_REFRESH.to_string(),
            sub: user.id,
            iss: self.config.issuer().to_string(),
            aud: self.config.audience().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.refresh_ttl_seconds(),
        };

        let access_token = sign_hs256(self.config.access_secret(), &access)
            .map_err(|err| anyhow::anyhow!("failed to sign access token: {err}"))?;
        let refresh_token = sign_hs256(self.config.refresh_secret(), &refresh)
            .map_err(|err| anyhow::anyhow!("failed to sign refresh token: {err}"))?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: access_ttl,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verify an access token against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the uniform [`TokenInvalid`] for every failure: bad
    /// signature, wrong issuer or audience, expiry, or a refresh token
    /// presented as an access token. The reason is logged at debug level
    /// and never returned.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenInvalid> {
        self.verify_access_at(token, Utc::now().timestamp())
    }

    /// [`Self::verify_access`] with an explicit verification instant.
    pub fn verify_access_at(&self, token: &str, now: i64) -> Result<AccessClaims, TokenInvalid> {
        self.check_access(token, now).map_err(|err| {
            debug!("access token rejected: {err}");
            TokenInvalid
        })
    }

    fn check_access(&self, token: &str, now: i64) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = verify_hs256(token, self.config.access_secret())?;
        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(TokenError::WrongTokenType);
        }
        self.check_common(&claims.iss, &claims.aud, claims.exp, now)?;
        Ok(claims)
    }

    /// Verify a refresh token against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the uniform [`TokenInvalid`]; an access token replayed here
    /// is rejected by the `type` discriminator even though both secrets may
    /// be configured identically.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenInvalid> {
        self.verify_refresh_at(token, Utc::now().timestamp())
    }

    /// [`Self::verify_refresh`] with an explicit verification instant.
    pub fn verify_refresh_at(&self, token: &str, now: i64) -> Result<RefreshClaims, TokenInvalid> {
        self.check_refresh(token, now).map_err(|err| {
            debug!("refresh token rejected: {err}");
            TokenInvalid
        })
    }

    fn check_refresh(&self, token: &str, now: i64) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = verify_hs256(token, self.config.refresh_secret())?;
        if claims.token_type != TOKEN_TYPE_REFRESH {
            return Err(TokenError::WrongTokenType);
        }
        self.check_common(&claims.iss, &claims.aud, claims.exp, now)?;
        Ok(claims)
    }

    fn check_common(&self, iss: &str, aud: &str, exp: i64, now: i64) -> Result<(), TokenError> {
        if iss != self.config.issuer() {
            return Err(TokenError::InvalidIssuer);
        }
        if aud != self.config.audience() {
            return Err(TokenError::InvalidAudience);
        }
        if now >= exp {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

/// Whether the claims are expired at `now` (unix seconds).
#[must_use]
pub fn is_expired(claims: &AccessClaims, now: i64) -> bool {
    now >= claims.exp
}

/// Remaining lifetime in seconds, clamped at zero.
#[must_use]
pub fn time_to_expiry(claims: &AccessClaims, now: i64) -> i64 {
    (claims.exp - now).max(0)
}

/// True iff remaining lifetime is at or below `threshold_seconds`.
#[must_use]
pub fn should_refresh_within(claims: &AccessClaims, threshold_seconds: i64, now: i64) -> bool {
    claims.exp - now <= threshold_seconds
}

/// [`should_refresh_within`] with the default 300 second threshold.
#[must_use]
pub fn should_refresh(claims: &AccessClaims, now: i64) -> bool {
    should_refresh_within(claims, DEFAULT_REFRESH_THRESHOLD_SECONDS, now)
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts exactly two space-separated parts with the literal scheme
/// `Bearer`; anything else yields `None`.
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UserStatus, UserType};
    use secrecy::SecretString;

    const NOW: i64 = 1_700_000_000;

    fn config() -> Arc<TokenConfig> {
        Arc::new(
            TokenConfig::new(
                SecretString::from("access-secret".to_string()),
                SecretString::from("refresh-secret".to_string()),
                "15m",
                "7d",
                "https://auth.transita.dev",
                "transita",
            )
            .unwrap(),
        )
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "dispatcher@transita.dev".to_string(),
            phone: None,
            first_name: "Ada".to_string(),
            last_name: "Okafor".to_string(),
            user_type: UserType::Dispatcher,
            status: UserStatus::Active,
            email_verified: true,
            phone_verified: false,
        }
    }

    fn issue(service: &TokenService) -> AuthTokens {
        service
            .issue_token_pair_at(
                &user(),
                vec!["dispatcher".to_string()],
                vec!["trip.assign".to_string(), "trip.view".to_string()],
                NOW,
            )
            .unwrap()
    }

    #[test]
    fn round_trip_preserves_flattened_claims() {
        let service = TokenService::new(config());
        let tokens = issue(&service);

        let claims = service.verify_access_at(&tokens.access_token, NOW).unwrap();
        assert_eq!(claims.roles, vec!["dispatcher"]);
        assert_eq!(claims.permissions, vec!["trip.assign", "trip.view"]);
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + 900);
        assert_eq!(tokens.expires_in, 900);
        assert_eq!(tokens.token_type, "Bearer");
    }

    #[test]
    fn expiry_boundary() {
        let service = TokenService::new(config());
        let tokens = issue(&service);

        // One second before exp is accepted, at exp is rejected.
        assert!(service.verify_access_at(&tokens.access_token, NOW + 899).is_ok());
        assert_eq!(
            service.verify_access_at(&tokens.access_token, NOW + 900),
            Err(TokenInvalid)
        );
        assert_eq!(
            service.verify_access_at(&tokens.access_token, NOW + 901),
            Err(TokenInvalid)
        );
    }

    #[test]
    fn tampering_with_any_byte_invalidates() {
        let service = TokenService::new(config());
        let tokens = issue(&service);

        let bytes = tokens.access_token.as_bytes();
        for index in [0, bytes.len() / 2, bytes.len() - 1] {
            let mut mutated = bytes.to_vec();
            mutated[index] = if mutated[index] == b'A' { b'B' } else { b'A' };
            let mutated = String::from_utf8(mutated).unwrap();
            assert_eq!(service.verify_access_at(&mutated, NOW), Err(TokenInvalid));
        }
    }

    #[test]
    fn token_types_are_not_interchangeable() {
        let service = TokenService::new(config());
        let tokens = issue(&service);

        assert_eq!(
            service.verify_access_at(&tokens.refresh_token, NOW),
            Err(TokenInvalid)
        );
        assert!(service
            .verify_refresh_at(&tokens.refresh_token, NOW)
            .is_ok());
        assert_eq!(
            service.verify_refresh_at(&tokens.access_token, NOW),
            Err(TokenInvalid)
        );
    }

    #[test]
    fn type_confusion_rejected_even_with_shared_secret() {
        // Same secret for both tokens: only the discriminator separates them.
        let config = Arc::new(
            TokenConfig::new(
                SecretString::from("shared".to_string()),
                SecretString::from("shared".to_string()),
                "15m",
                "7d",
                "iss",
                "aud",
            )
            .unwrap(),
        );
        let service = TokenService::new(config);
        let tokens = service
            .issue_token_pair_at(&user(), Vec::new(), Vec::new(), NOW)
            .unwrap();

        assert_eq!(
            service.verify_access_at(&tokens.refresh_token, NOW),
            Err(TokenInvalid)
        );
        assert_eq!(
            service.verify_refresh_at(&tokens.access_token, NOW),
            Err(TokenInvalid)
        );
    }

    #[test]
    fn wrong_issuer_or_audience_rejected() {
        let service = TokenService::new(config());
        let tokens = issue(&service);

        let other = TokenService::new(Arc::new(
            TokenConfig::new(
                SecretString::from("access-secret".to_string()),
                SecretString::from("refresh-secret".to_string()),
                "15m",
                "7d",
                "https://auth.transita.dev",
                "someone-else",
            )
            .unwrap(),
        ));
        assert_eq!(
            other.verify_access_at(&tokens.access_token, NOW),
            Err(TokenInvalid)
        );
    }

    #[test]
    fn should_refresh_threshold_boundaries() {
        let service = TokenService::new(config());
        let tokens = issue(&service);
        let claims = service.verify_access_at(&tokens.access_token, NOW).unwrap();

        for (remaining, expected) in [(0, true), (299, true), (300, true), (301, false)] {
            let now = claims.exp - remaining;
            assert_eq!(
                should_refresh(&claims, now),
                expected,
                "remaining {remaining}"
            );
        }
    }

    #[test]
    fn expiry_helpers() {
        let service = TokenService::new(config());
        let tokens = issue(&service);
        let claims = service.verify_access_at(&tokens.access_token, NOW).unwrap();

        assert!(!is_expired(&claims, claims.exp - 1));
        assert!(is_expired(&claims, claims.exp));
        assert_eq!(time_to_expiry(&claims, NOW), 900);
        assert_eq!(time_to_expiry(&claims, claims.exp + 50), 0);
    }

    #[test]
    fn bearer_extraction_requires_exact_shape() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Bearer abc def"), None);
        assert_eq!(extract_bearer_token("Bearer  abc"), None);
        assert_eq!(extract_bearer_token(""), None);
    }

    #[test]
    fn garbage_tokens_rejected() {
        let service = TokenService::new(config());
        for token in ["", "a.b", "a.b.c.d", "not-a-token", "a.b.c"] {
            assert_eq!(service.verify_access_at(token, NOW), Err(TokenInvalid));
        }
    }
}
