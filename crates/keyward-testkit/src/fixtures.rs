//! Shared fixtures

use crate::effects::SequentialIds;
use crate::time::ManualClock;
use keyward_core::{Clock, Collection, Entity, IdGenerator};
use keyward_store::MemoryCollection;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Install a test-writer tracing subscriber once per process.
///
/// Honors `RUST_LOG`; silent by default.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Empty in-memory collection
pub fn collection<T: Entity>(
    name: &str,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
) -> Arc<dyn Collection<T>> {
    MemoryCollection::<T>::shared(name, ids, clock)
}

/// Manual clock plus sequential ids, the usual effect pair for unit tests
#[derive(Clone)]
pub struct TestEffects {
    /// Clock driving every collection
    pub clock: ManualClock,
    /// Shared sequential ids
    pub ids: Arc<dyn IdGenerator>,
}

impl TestEffects {
    /// Effects starting at `unix_secs`
    pub fn manual(unix_secs: i64) -> Self {
        Self {
            clock: ManualClock::new(unix_secs),
            ids: Arc::new(SequentialIds::default()),
        }
    }

    /// The manual clock as a trait object
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.shared()
    }

    /// In-memory collection sharing these effects
    pub fn collection<T: Entity>(&self, name: &str) -> Arc<dyn Collection<T>> {
        collection(name, self.ids.clone(), self.clock())
    }
}
