//! Token signing configuration.
//!
//! Built once at process start and shared behind an `Arc`; every field is
//! immutable after construction so concurrent verification never needs
//! synchronization. Expiry strings are parsed here: a malformed duration is
//! a fatal configuration error, not a per-request one.

use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Default access token lifetime.
pub const DEFAULT_ACCESS_EXPIRY: &str = "15m";
/// Default refresh token lifetime.
pub const DEFAULT_REFRESH_EXPIRY: &str = "7d";
/// Default `should_refresh` threshold in seconds.
pub const DEFAULT_REFRESH_THRESHOLD_SECONDS: i64 = 300;

#[derive(Debug)]
pub struct TokenConfig {
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    issuer: String,
    audience: String,
}

impl TokenConfig {
    /// Build the configuration, parsing both expiry strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDurationFormat`] when either expiry string is
    /// not `<integer><unit>` with unit in `s`, `m`, `h`, `d`.
    pub fn new(
        access_secret: SecretString,
        refresh_secret: SecretString,
        access_expiry: &str,
        refresh_expiry: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl_seconds: parse_expiry(access_expiry)?,
            refresh_ttl_seconds: parse_expiry(refresh_expiry)?,
            issuer: issuer.into(),
            audience: audience.into(),
        })
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub(crate) fn access_secret(&self) -> &[u8] {
        self.access_secret.expose_secret().as_bytes()
    }

    pub(crate) fn refresh_secret(&self) -> &[u8] {
        self.refresh_secret.expose_secret().as_bytes()
    }
}

/// Parse a duration of the form `<integer><unit>` into seconds.
///
/// Unit is one of `s`, `m`, `h`, `d`. `"15m"` parses to `900`.
///
/// # Errors
///
/// Returns [`Error::InvalidDurationFormat`] on malformed input.
pub fn parse_expiry(duration: &str) -> Result<i64, Error> {
    let invalid = || Error::InvalidDurationFormat(duration.to_string());

    let Some(unit) = duration.chars().last() else {
        return Err(invalid());
    };
    let magnitude = &duration[..duration.len() - unit.len_utf8()];
    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let magnitude: i64 = magnitude.parse().map_err(|_| invalid())?;
    let per_unit = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    magnitude.checked_mul(per_unit).ok_or_else(invalid)
}
