//! Cancellable background task owned by a store.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for JoinHandle storage because the lock is never
//! held across `.await` points.

use crate::errors::{KeywardError, Result};
use parking_lot::Mutex;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One long-lived task plus the shutdown signal that stops it
#[derive(Debug)]
pub(crate) struct BackgroundTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            name,
            shutdown_tx,
            handle: Mutex::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn `task` on the current tokio runtime. `task` receives the
    /// shutdown receiver and must return once it flips to `true`.
    pub(crate) fn spawn<F, Fut>(&self, task: F) -> Result<()>
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = self.ensure_spawnable()?;
        let mut slot = self.handle.lock();
        if slot.is_some() {
            return Err(self.already_running());
        }
        *slot = Some(runtime.spawn(task(self.shutdown_tx.subscribe())));
        tracing::debug!(task = self.name, "Background task started");
        Ok(())
    }

    /// Fails when [`spawn`](Self::spawn) would: already running, shut down,
    /// or called outside a tokio runtime
    pub(crate) fn ensure_spawnable(&self) -> Result<tokio::runtime::Handle> {
        if *self.shutdown_tx.borrow() {
            return Err(KeywardError::storage(format!("{} already shut down", self.name)));
        }
        if self.handle.lock().is_some() {
            return Err(self.already_running());
        }
        tokio::runtime::Handle::try_current().map_err(|err| {
            KeywardError::internal(format!("{} needs a tokio runtime: {err}", self.name))
        })
    }

    fn already_running(&self) -> KeywardError {
        KeywardError::conflict(format!("{} already running", self.name))
    }

    /// Signal shutdown and wait for the task to return
    pub(crate) async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::error!(task = self.name, error = %err, "Background task failed");
            }
        }
        tracing::debug!(task = self.name, "Background task stopped");
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            if shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn shutdown_stops_and_joins() {
        let task = BackgroundTask::new("test loop");
        task.spawn(wait_for_shutdown).unwrap();
        assert!(task.is_running());

        task.shutdown().await;
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn cannot_spawn_twice_or_after_shutdown() {
        let task = BackgroundTask::new("test loop");
        task.spawn(wait_for_shutdown).unwrap();
        assert!(task.spawn(wait_for_shutdown).unwrap_err().is_conflict());

        task.shutdown().await;
        assert!(task.spawn(wait_for_shutdown).is_err());
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let task = BackgroundTask::new("test loop");
        let err = task.spawn(wait_for_shutdown).unwrap_err();
        assert!(matches!(err, KeywardError::Internal { .. }));
    }
}
