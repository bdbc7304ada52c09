//! Argon2id hashing for user secrets.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=19456,t=2,p=1$...`), so the
//! salt and parameters travel with the hash. Hashing is CPU and memory heavy, so the
//! async wrappers move the work onto tokio's blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// A well-formed hash that matches no secret, verified against when an identity is
/// unknown so that login takes the same time either way.
pub const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash secret: {0}")]
    Hash(String),
    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
    #[error("Password worker failed")]
    Worker(#[from] tokio::task::JoinError),
}

/// Hashes a secret with a fresh random salt.
pub fn hash_secret_blocking(secret: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks a secret against a PHC hash. `Ok(false)` means the secret does not match.
pub fn verify_secret_blocking(secret: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn hash_secret(secret: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_secret_blocking(&secret)).await?
}

pub async fn verify_secret(secret: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_secret_blocking(&secret, &hash)).await?
}
