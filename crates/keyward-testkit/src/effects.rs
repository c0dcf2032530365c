//! Deterministic id generation and a transparent password hasher

use keyward_core::{IdGenerator, KeywardError, PasswordHasher, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Produces `{prefix}_0`, `{prefix}_1`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Start at `{prefix}_0`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    /// Generator behind an `Arc`
    pub fn shared(prefix: impl Into<String>) -> Arc<dyn IdGenerator> {
        Arc::new(Self::new(prefix))
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}_{n}", self.prefix)
    }
}

/// Reversible stand-in for a real password hash
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHasher;

const PLAIN_PREFIX: &str = "plain$";

impl PlainHasher {
    /// Hasher behind an `Arc`
    pub fn shared() -> Arc<dyn PasswordHasher> {
        Arc::new(Self)
    }
}

impl PasswordHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(KeywardError::invalid("cannot hash an empty password"));
        }
        Ok(format!("{PLAIN_PREFIX}{plaintext}"))
    }

    fn matches(&self, hashed: &str, plaintext: &str) -> bool {
        hashed.strip_prefix(PLAIN_PREFIX) == Some(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let ids = SequentialIds::new("user");
        assert_eq!(ids.generate(), "user_0");
        assert_eq!(ids.generate(), "user_1");
    }

    #[test]
    fn hasher_round_trips() {
        let hashed = PlainHasher.hash("secret").unwrap();
        assert_ne!(hashed, "secret");
        assert!(PlainHasher.matches(&hashed, "secret"));
        assert!(!PlainHasher.matches(&hashed, "Secret"));
        assert!(!PlainHasher.matches("secret", "secret"));
    }
}
