use bcrypt::{DEFAULT_COST, hash, verify};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    Hash,
}

/// Hash a plaintext password with bcrypt at the default cost.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    hash(plain, DEFAULT_COST).map_err(|_| PasswordError::Hash)
}

/// Constant-style credential check: any bcrypt failure reads as a mismatch,
/// so callers cannot distinguish a bad hash from a bad password.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    verify(plain, hashed).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify_and_mismatches_fail() {
        let hashed = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hashed));
        assert!(!verify_password("wrong password", &hashed));
    }

    #[test]
    fn malformed_hashes_read_as_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
