//! Unique identifier generation.
//!
//! Each store owns its own generator instance; there is no process-wide
//! singleton.

use std::sync::Arc;
use uuid::Uuid;

/// Produces globally-unique opaque identifiers. Must be thread-safe.
pub trait IdGenerator: Send + Sync {
    /// A fresh identifier, never returned before
    fn generate(&self) -> String;
}

/// Random (v4) UUID generator
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl UuidGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }

    /// Generator behind an `Arc`
    pub fn shared() -> Arc<dyn IdGenerator> {
        Arc::new(Self)
    }
}

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl<T: IdGenerator + ?Sized> IdGenerator for Arc<T> {
    fn generate(&self) -> String {
        (**self).generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_generator_is_unique() {
        let ids = UuidGenerator::new();
        let generated: HashSet<_> = (0..256).map(|_| ids.generate()).collect();
        assert_eq!(generated.len(), 256);
        assert!(generated.iter().all(|id| id.len() == 32));
    }
}
