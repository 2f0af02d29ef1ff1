//! Password hashing and secure token/code generation.
//!
//! Hashing is Argon2id with a per-password salt from the OS random source.
//! It is deliberately slow; latency-sensitive callers use the `_blocking`
//! wrappers, which offload to a worker thread instead of running inline on
//! the event loop. All random material comes from `OsRng`.

use anyhow::{Context, Result, anyhow};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::{RngCore, rngs::OsRng};

const VERIFICATION_TOKEN_BYTES: usize = 32;
const PASSWORD_RESET_TOKEN_BYTES: usize = 32;
const CSRF_TOKEN_BYTES: usize = 32;
const SESSION_ID_BYTES: usize = 64;
const PHONE_CODE_DIGITS: u32 = 6;

/// Hash a password with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns an error if salt generation or hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| anyhow!("failed to hash password"))
}

/// Verify a password against a stored Argon2 hash string.
///
/// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
///
/// # Errors
///
/// Returns an error if the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| anyhow!("malformed password hash"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash_password`] dispatched to the blocking thread pool.
///
/// # Errors
///
/// Returns an error if hashing fails or the worker task is cancelled.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")?
}

/// [`verify_password`] dispatched to the blocking thread pool.
///
/// # Errors
///
/// Returns an error if the stored hash is malformed or the worker task is
/// cancelled.
pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .context("password verification task failed")?
}

fn random_hex(bytes: usize) -> Result<String> {
    let mut buffer = vec![0u8; bytes];
    OsRng
        .try_fill_bytes(&mut buffer)
        .context("failed to read from the OS random source")?;
    Ok(hex::encode(buffer))
}

/// Token for email verification links (32 bytes of entropy, hex).
///
/// # Errors
///
/// Returns an error if the OS random source fails.
pub fn generate_verification_token() -> Result<String> {
    random_hex(VERIFICATION_TOKEN_BYTES)
}

/// Token for password reset links (32 bytes of entropy, hex).
///
/// # Errors
///
/// Returns an error if the OS random source fails.
pub fn generate_password_reset_token() -> Result<String> {
    random_hex(PASSWORD_RESET_TOKEN_BYTES)
}

/// CSRF token (32 bytes of entropy, hex).
///
/// # Errors
///
/// Returns an error if the OS random source fails.
pub fn generate_csrf_token() -> Result<String> {
    random_hex(CSRF_TOKEN_BYTES)
}

/// Session identifier (64 bytes of entropy, hex).
///
/// # Errors
///
/// Returns an error if the OS random source fails.
pub fn generate_session_id() -> Result<String> {
    random_hex(SESSION_ID_BYTES)
}

/// Six-digit numeric code for phone verification.
///
/// Rejection-sampled so every code is equally likely.
///
/// # Errors
///
/// Returns an error if the OS random source fails.
pub fn generate_phone_code() -> Result<String> {
    let modulus = 10u32.pow(PHONE_CODE_DIGITS);
    // Largest multiple of the modulus that fits in u32.
    let bound = u32::MAX - (u32::MAX % modulus);
    loop {
        let mut bytes = [0u8; 4];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to read from the OS random source")?;
        let value = u32::from_be_bytes(bytes);
        if value < bound {
            return Ok(format!("{:06}", value % modulus));
        }
    }
}
