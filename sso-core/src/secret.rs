//! Argon2 hashing for client secrets and user passwords.

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::sync::OnceLock;

use crate::error::BrokerError;

/// Hash a secret into an argon2id PHC string.
pub fn hash_secret(secret: &str) -> Result<String, BrokerError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| BrokerError::Signing(format!("failed to hash secret: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a secret against a stored PHC string.
///
/// An unparsable hash never matches.
pub fn verify_secret(hash: &str, secret: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored secret hash could not be parsed: {e}");
            false
        }
    }
}

/// Argon2 hash of a random secret, verified in place of a missing user's hash
/// so unknown and known logins cost the same.
pub fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_secret(&random_token(32)).unwrap_or_default())
}

/// `len` random bytes encoded as base64url without padding
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
