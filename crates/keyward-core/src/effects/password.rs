//! Password hashing collaborator.
//!
//! Keyward never hashes passwords itself; deployments inject a hasher
//! (bcrypt, argon2, ...).

use crate::errors::Result;

/// One-way password hashing
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Whether `plaintext` matches a previously hashed value
    fn matches(&self, hashed: &str, plaintext: &str) -> bool;
}
