//! SSO login code store and expiration scheduler
//!
//! Each user holds at most one live [`Entry`]. An entry is consumed by
//! [`SsoCodes::login`], kept alive by [`SsoCodes::multi_login`], or reaped by
//! the scheduler once `expiresAt` passes.

mod entry;
mod scheduler;

pub use entry::{
    day_bucket, hour_bucket, Entry, EXPIRES_AT, EXPIRES_AT_DATES, EXPIRES_AT_HOURS, LOGIN_CODES,
    USERS,
};

use crate::errors::{no_code_match, KeywardError, Result};
use crate::tasks::BackgroundTask;
use chrono::{DateTime, Utc};
use keyward_core::config::SsoConfig;
use keyward_core::store::{optional, CollectionExt};
use keyward_core::{Clock, Collection, Entity, IdGenerator, ReadTxn};
use parking_lot::Mutex;
use scheduler::Notifier;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Inner {
    entries: Arc<dyn Collection<Entry>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: SsoConfig,
    notifier: Notifier,
    wake: Mutex<Option<mpsc::Receiver<()>>>,
    scheduler: BackgroundTask,
}

/// Persistent SSO login codes
#[derive(Clone)]
pub struct SsoCodes {
    inner: Arc<Inner>,
}

/// Outcome of consuming a code; an expired code is still deleted
enum Consumed {
    Live(Entry),
    Expired(Entry),
}

impl SsoCodes {
    /// Create the store. The scheduler starts with [`SsoCodes::spawn_scheduler`].
    pub fn new(
        entries: Arc<dyn Collection<Entry>>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: SsoConfig,
    ) -> Self {
        let (notifier, wake) = scheduler::wake_channel();
        Self {
            inner: Arc::new(Inner {
                entries,
                ids,
                clock,
                config,
                notifier,
                wake: Mutex::new(Some(wake)),
                scheduler: BackgroundTask::new("sso expiration scheduler"),
            }),
        }
    }

    /// Issue a fresh code for `user_id`, replacing any existing entry
    pub fn new_entry(&self, user_id: &str) -> Result<Entry> {
        if user_id.is_empty() {
            return Err(KeywardError::validation("userID is required"));
        }
        let expires_at = self.inner.clock.now() + delta(self.inner.config.entry_ttl())?;
        let entry = Entry {
            user_id: user_id.to_string(),
            login_code: self.inner.ids.generate(),
            expires_at,
            ..Default::default()
        };

        let entry = self.inner.entries.write(move |txn| {
            for existing in txn.get_filtered(USERS, &entry.user_id)? {
                txn.delete(existing.id())?;
            }
            txn.create(entry)
        })?;

        self.inner.notifier.notify();
        tracing::debug!(user_id, entry_id = %entry.id(), "SSO entry issued");
        Ok(entry)
    }

    /// Consume `login_code` and return its user.
    ///
    /// The entry is deleted even when it has already expired; that case
    /// reports `Expired`.
    pub fn login(&self, login_code: &str) -> Result<String> {
        let now = self.inner.clock.now();
        let consumed = self.inner.entries.write(|txn| {
            let entry = find_by_code(txn.as_read(), login_code)?;
            let entry = txn.delete(entry.id())?;
            Ok(if entry.is_expired(now) {
                Consumed::Expired(entry)
            } else {
                Consumed::Live(entry)
            })
        })?;
        self.inner.notifier.notify();

        match consumed {
            Consumed::Live(entry) => {
                tracing::debug!(user_id = %entry.user_id, "SSO code consumed");
                Ok(entry.user_id)
            }
            Consumed::Expired(entry) => {
                tracing::debug!(user_id = %entry.user_id, "Expired SSO code consumed");
                Err(KeywardError::expired("login code has expired"))
            }
        }
    }

    /// Log in without consuming the code, extending its expiry to
    /// `now + ttl` when that is later than the current expiry
    pub fn multi_login(&self, login_code: &str, ttl: Duration) -> Result<String> {
        let now = self.inner.clock.now();
        let candidate = now + delta(ttl)?;

        let (entry, extended) = self.inner.entries.write(|txn| {
            let entry = find_by_code(txn.as_read(), login_code)?;
            if entry.is_expired(now) {
                return Err(KeywardError::expired("login code has expired"));
            }
            if candidate <= entry.expires_at {
                return Ok((entry, false));
            }
            let updated = txn.update(entry.id(), &mut |e: &mut Entry| {
                e.expires_at = candidate;
                Ok(())
            })?;
            Ok((updated, true))
        })?;

        if extended {
            self.inner.notifier.notify();
        }
        Ok(entry.user_id)
    }

    /// Look up by entry id
    pub fn get(&self, entry_id: &str) -> Result<Entry> {
        self.inner
            .entries
            .read(|txn| txn.get(entry_id))
            .map_err(entry_not_found)
    }

    /// The live entry for `user_id`
    pub fn get_by_user(&self, user_id: &str) -> Result<Entry> {
        self.inner
            .entries
            .read(|txn| txn.get_first(USERS, user_id))
            .map_err(entry_not_found)
    }

    /// Look up without consuming
    pub fn get_by_code(&self, login_code: &str) -> Result<Entry> {
        self.inner
            .entries
            .read(|txn| txn.get_first(LOGIN_CODES, login_code))
            .map_err(entry_not_found)
    }

    /// The entry with the earliest `expiresAt`
    pub fn get_next_to_expire(&self) -> Result<Entry> {
        self.inner
            .entries
            .read(|txn| txn.first_ordered(EXPIRES_AT))
            .map_err(entry_not_found)
    }

    /// Every stored entry
    pub fn list(&self) -> Result<Vec<Entry>> {
        self.inner.entries.read(|txn| txn.all())
    }

    /// Delete by entry id
    pub fn delete(&self, entry_id: &str) -> Result<Entry> {
        let removed = self
            .inner
            .entries
            .write(|txn| txn.delete(entry_id))
            .map_err(entry_not_found)?;
        self.inner.notifier.notify();
        Ok(removed)
    }

    /// Delete the user's entries, returning how many were removed
    pub fn delete_by_user(&self, user_id: &str) -> Result<usize> {
        let removed = self.inner.entries.write(|txn| {
            let entries = txn.get_filtered(USERS, user_id)?;
            for entry in &entries {
                txn.delete(entry.id())?;
            }
            Ok(entries.len())
        })?;
        if removed > 0 {
            self.inner.notifier.notify();
        }
        Ok(removed)
    }

    /// Entries whose expiry fell within the last hour
    pub fn get_expired_within_previous_hour(&self) -> Result<Vec<Entry>> {
        let window = self.window(chrono::Duration::hours(1), hour_bucket);
        self.inner
            .entries
            .read(|txn| expired_in(txn, EXPIRES_AT_HOURS, &window))
    }

    /// Entries whose expiry fell within the last day
    pub fn get_expired_within_previous_day(&self) -> Result<Vec<Entry>> {
        let window = self.window(chrono::Duration::days(1), day_bucket);
        self.inner
            .entries
            .read(|txn| expired_in(txn, EXPIRES_AT_DATES, &window))
    }

    /// Delete entries that expired within the last hour
    pub fn delete_expired_in_past_hour(&self) -> Result<usize> {
        let window = self.window(chrono::Duration::hours(1), hour_bucket);
        self.delete_expired(EXPIRES_AT_HOURS, &window)
    }

    /// Delete entries that expired within the last day
    pub fn delete_expired_in_past_day(&self) -> Result<usize> {
        let window = self.window(chrono::Duration::days(1), day_bucket);
        self.delete_expired(EXPIRES_AT_DATES, &window)
    }

    /// Start the expiration scheduler on the current tokio runtime
    pub fn spawn_scheduler(&self) -> Result<()> {
        self.inner.scheduler.ensure_spawnable()?;
        let wake = self
            .inner
            .wake
            .lock()
            .take()
            .ok_or_else(|| KeywardError::conflict("sso expiration scheduler already started"))?;

        let entries = self.inner.entries.clone();
        let clock = self.inner.clock.clone();
        self.inner
            .scheduler
            .spawn(move |shutdown| scheduler::run(entries, clock, wake, shutdown))
    }

    /// Whether the expiration scheduler is running
    pub fn is_scheduling(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    /// Stop the scheduler, wait for it to exit and release the collection
    pub async fn close(&self) -> Result<()> {
        self.inner.scheduler.shutdown().await;
        self.inner.entries.close()
    }

    fn window(
        &self,
        span: chrono::Duration,
        bucket: fn(DateTime<Utc>) -> String,
    ) -> ExpiryWindow {
        let until = self.inner.clock.now();
        let since = until - span;
        let mut buckets = vec![bucket(since), bucket(until)];
        buckets.dedup();
        ExpiryWindow {
            since,
            until,
            buckets,
        }
    }

    fn delete_expired(&self, index: &'static str, window: &ExpiryWindow) -> Result<usize> {
        let removed = self.inner.entries.write(|txn| {
            let expired = expired_in(txn.as_read(), index, window)?;
            for entry in &expired {
                txn.delete(entry.id())?;
            }
            Ok(expired.len())
        })?;
        if removed > 0 {
            tracing::debug!(removed, index, "Deleted expired SSO entries");
            self.inner.notifier.notify();
        }
        Ok(removed)
    }
}

/// Expiry range `(since, until]` and the bucket labels covering it
struct ExpiryWindow {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    buckets: Vec<String>,
}

fn expired_in(
    txn: &dyn ReadTxn<Entry>,
    index: &str,
    window: &ExpiryWindow,
) -> Result<Vec<Entry>> {
    let mut found = BTreeMap::new();
    for bucket in &window.buckets {
        for entry in txn.get_filtered(index, bucket)? {
            if entry.expires_at > window.since && entry.expires_at <= window.until {
                found.insert(entry.id().to_string(), entry);
            }
        }
    }
    Ok(found.into_values().collect())
}

fn find_by_code(txn: &dyn ReadTxn<Entry>, login_code: &str) -> Result<Entry> {
    if login_code.is_empty() {
        return Err(no_code_match());
    }
    optional(txn.get_first(LOGIN_CODES, login_code))?.ok_or_else(no_code_match)
}

fn entry_not_found(err: KeywardError) -> KeywardError {
    if err.is_not_found() {
        KeywardError::not_found("sso entry not found")
    } else {
        err
    }
}

fn delta(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|err| KeywardError::invalid(format!("duration out of range: {err}")))
}
