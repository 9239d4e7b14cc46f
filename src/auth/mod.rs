//! Password hashing collaborator.
//!
//! The catalog only consumes hash-and-verify; the digest scheme is pluggable.
//! Verification compares digests in constant time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Hash-and-verify primitive used for user credentials.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str, salt: &str) -> String;

    fn verify(&self, digest: &str, salt: &str, password: &str) -> bool {
        constant_time_compare(&self.hash(password, salt), digest)
    }
}

/// Salted SHA-256, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A fresh random salt.
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("digest-123", "digest-123"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-digest"));
    }

    #[test]
    fn test_hash_verify() {
        let hasher = Sha256Hasher;
        let salt = generate_salt();
        let digest = hasher.hash("hunter2", &salt);

        assert_eq!(digest.len(), 64);
        assert!(hasher.verify(&digest, &salt, "hunter2"));
        assert!(!hasher.verify(&digest, &salt, "hunter3"));
        assert!(!hasher.verify(&digest, "other-salt", "hunter2"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
