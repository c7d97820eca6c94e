//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=19456,t=2,p=1$...`) with a
//! per-password random salt. Hashing and verification are CPU-bound, so the
//! async wrappers run them on the blocking thread pool.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};

/// Verified in place of a real hash when the username is unknown, so both
/// failure paths cost one Argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password_blocking("dummy-password-for-timing").ok());

/// Hash a password using Argon2id. Returns a PHC-format string.
pub(crate) fn hash_password_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {e}"))
}

/// Verify a password against a PHC-format hash. Malformed hashes never match.
pub(crate) fn verify_password_blocking(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

pub(crate) async fn hash_password(password: &SecretString) -> Result<String> {
    let password = password.clone();
    tokio::task::spawn_blocking(move || hash_password_blocking(password.expose_secret()))
        .await
        .context("password hashing task failed")?
}

/// Verify against `hash`, or against a dummy hash when `hash` is `None`
/// (which then always fails).
pub(crate) async fn verify_password(password: &SecretString, hash: Option<String>) -> Result<bool> {
    let password = password.clone();
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password_blocking(password.expose_secret(), &hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password_blocking(password.expose_secret(), dummy);
            }
            false
        }
    })
    .await
    .context("password verification task failed")
}
