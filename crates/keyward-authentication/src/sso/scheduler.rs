//! Expiration scheduler
//!
//! Sleeps until the earliest `expiresAt` and deletes that entry. A new entry
//! or an extended expiry wakes it early through a single-slot notify channel,
//! so a burst of inserts coalesces into one wake. With no entries it blocks
//! until notified. Shutdown takes priority over every other wake source.
//! A failed lookup or reap backs off for [`RETRY_DELAY`] before retrying.

use super::entry::{Entry, EXPIRES_AT};
use keyward_core::store::{optional, CollectionExt};
use keyward_core::{Clock, Collection, Entity, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Back-off after a failed lookup or reap
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Sending half of the wake signal
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<()>,
}

impl Notifier {
    /// Wake the scheduler without blocking; pending wakes coalesce
    pub(crate) fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

pub(crate) fn wake_channel() -> (Notifier, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (Notifier { tx }, rx)
}

pub(crate) async fn run(
    entries: Arc<dyn Collection<Entry>>,
    clock: Arc<dyn Clock>,
    mut wake: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = match entries.read(|txn| optional(txn.first_ordered(EXPIRES_AT))) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to find next SSO entry to expire");
                if !back_off(&mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        let Some(entry) = next else {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                woke = wake.recv() => {
                    if woke.is_none() {
                        break;
                    }
                }
            }
            continue;
        };

        let wait = (entry.expires_at - clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let reap_failed = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            woke = wake.recv() => {
                if woke.is_none() {
                    break;
                }
                false
            }
            _ = tokio::time::sleep(wait) => {
                match reap(entries.as_ref(), clock.as_ref(), &entry) {
                    Ok(()) => false,
                    Err(err) => {
                        tracing::warn!(
                            entry_id = %entry.id(),
                            error = %err,
                            "Failed to reap SSO entry"
                        );
                        true
                    }
                }
            }
        };

        if reap_failed && !back_off(&mut shutdown).await {
            break;
        }
    }
    tracing::debug!("SSO expiration scheduler stopped");
}

/// Wait out [`RETRY_DELAY`]; `false` when shutdown arrived first
async fn back_off(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(RETRY_DELAY) => true,
    }
}

/// Delete `expected` if it still exists and is still expired
fn reap(entries: &dyn Collection<Entry>, clock: &dyn Clock, expected: &Entry) -> Result<()> {
    let now = clock.now();
    let reaped = entries.write(|txn| match optional(txn.get(expected.id()))? {
        Some(current) if current.is_expired(now) => txn.delete(current.id()).map(Some),
        _ => Ok(None),
    })?;

    if let Some(entry) = reaped {
        tracing::debug!(entry_id = %entry.id(), user_id = %entry.user_id, "SSO entry expired");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::store::{ReadFn, WriteFn};
    use keyward_core::KeywardError;
    use keyward_testkit::{collection, SequentialIds, TokioClock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads pass through; every write fails
    struct ReadOnly {
        inner: Arc<dyn Collection<Entry>>,
        writes: AtomicUsize,
    }

    impl Collection<Entry> for ReadOnly {
        fn name(&self) -> &str {
            "sso"
        }

        fn transaction(&self, _f: &mut WriteFn<'_, Entry>) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(KeywardError::storage("read-only"))
        }

        fn read_transaction(&self, f: &mut ReadFn<'_, Entry>) -> Result<()> {
            self.inner.read_transaction(f)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reap_backs_off() {
        let clock = TokioClock::new(1_700_000_000).shared();
        let inner = collection::<Entry>("sso", SequentialIds::shared("sso"), clock.clone());
        let expired = Entry {
            user_id: "user_0".to_string(),
            login_code: "code".to_string(),
            expires_at: clock.now() - chrono::Duration::seconds(1),
            ..Default::default()
        };
        inner.write(move |txn| txn.create(expired)).unwrap();

        let entries = Arc::new(ReadOnly {
            inner,
            writes: AtomicUsize::new(0),
        });
        let (notifier, wake) = wake_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(entries.clone(), clock, wake, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        drop(notifier);

        let attempts = entries.writes.load(Ordering::SeqCst);
        assert!((10..=12).contains(&attempts), "{attempts} reap attempts");
    }

    #[tokio::test]
    async fn notifications_coalesce() {
        let (notifier, mut rx) = wake_channel();
        notifier.notify();
        notifier.notify();
        notifier.notify();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
