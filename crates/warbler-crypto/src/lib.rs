//! Warbler Crypto Library
//!
//! Credential handling for account passwords (Argon2id digests) and
//! minting of opaque session tokens. Everything here is stateless and
//! safe to call from any thread.

pub mod password;
pub mod token;

pub use password::{CredentialError, hash_password, verify_password};
pub use token::generate_session_token;
