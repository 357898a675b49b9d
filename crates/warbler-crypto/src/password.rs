use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Hash a password with Argon2id and a fresh random salt.
/// Returns the PHC string, which embeds the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    if password.is_empty() {
        return Err(CredentialError::EmptyPassword);
    }

    let salt = SaltString::generate(&mut OsRng);
    let digest = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
        .to_string();

    Ok(digest)
}

/// Check a password against a stored digest. A malformed digest is a mismatch.
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
