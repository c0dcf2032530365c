//! Session store
//!
//! A session binds a `(key, token)` pair to a user. The pair is only ever
//! stored combined as `"{key}:{token}"`; callers deliver the two halves over
//! separate channels.
//!
//! Sessions slide: a lookup older than the refresh period rewrites
//! `lastUsedAt`. A fixed-interval purge loop deletes sessions idle longer
//! than the TTL, so an expired session stays readable until the next sweep.

use crate::errors::{KeywardError, Result};
use crate::tasks::BackgroundTask;
use keyward_core::config::SessionConfig;
use keyward_core::store::CollectionExt;
use keyward_core::{Clock, Collection, Entity, EntityMeta, IdGenerator, Relationships};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Index holding each session's composite key
pub const SESSION_KEYS: &str = "sessionKeys";

/// Index holding each session's user id
pub const USERS: &str = "users";

const SEPARATOR: char = ':';

/// Combine the two credential halves into the stored session key
pub fn session_key(key: &str, token: &str) -> String {
    format!("{key}{SEPARATOR}{token}")
}

/// A logged-in user agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Id and timestamps
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Combined `{key}:{token}` lookup key
    #[serde(rename = "sessionKey")]
    pub key: String,
    /// Session owner
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Unix seconds
    #[serde(rename = "lastUsedAt")]
    pub last_used_at: i64,
}

impl Entity for Session {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn relationships(&self) -> Relationships {
        Relationships::new()
            .with(SESSION_KEYS, self.key.clone())
            .with(USERS, self.user_id.clone())
    }
}

/// The two halves handed to a client when a session is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPair {
    /// Half sent in the first cookie
    pub key: String,
    /// Half sent in the second cookie
    pub token: String,
}

struct Inner {
    sessions: Arc<dyn Collection<Session>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    purge: BackgroundTask,
}

/// Persistent session store with a periodic purge loop
#[derive(Clone)]
pub struct Sessions {
    inner: Arc<Inner>,
}

impl Sessions {
    /// Create the store. The purge loop starts with [`Sessions::spawn_purge_loop`].
    pub fn new(
        sessions: Arc<dyn Collection<Session>>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions,
                ids,
                clock,
                config,
                purge: BackgroundTask::new("session purge loop"),
            }),
        }
    }

    /// Open a session for `user_id`
    pub fn new_session(&self, user_id: &str) -> Result<SessionPair> {
        if user_id.is_empty() {
            return Err(KeywardError::validation("userID is required"));
        }
        let pair = SessionPair {
            key: self.inner.ids.generate(),
            token: self.inner.ids.generate(),
        };
        let session = Session {
            key: session_key(&pair.key, &pair.token),
            user_id: user_id.to_string(),
            last_used_at: self.inner.clock.unix_now(),
            ..Default::default()
        };

        self.inner.sessions.write(move |txn| txn.create(session))?;
        tracing::debug!(user_id, "Session opened");
        Ok(pair)
    }

    /// Look up a session, refreshing `lastUsedAt` once it is older than the
    /// refresh period. A failed refresh does not fail the lookup.
    pub fn get(&self, key: &str, token: &str) -> Result<Session> {
        let composite = session_key(key, token);
        let session = self.find(&composite)?;

        let idle = self.inner.clock.unix_now() - session.last_used_at;
        if idle <= secs(self.inner.config.refresh_period()) {
            return Ok(session);
        }

        match self.touch(&composite) {
            Ok(refreshed) => Ok(refreshed),
            Err(err) => {
                tracing::warn!(user_id = %session.user_id, error = %err, "Session refresh failed");
                Ok(session)
            }
        }
    }

    /// Unconditionally rewrite `lastUsedAt`
    pub fn refresh(&self, key: &str, token: &str) -> Result<Session> {
        self.touch(&session_key(key, token))
    }

    /// Log out
    pub fn remove(&self, key: &str, token: &str) -> Result<()> {
        let composite = session_key(key, token);
        let removed = self.inner.sessions.write(move |txn| {
            let session = txn
                .get_first(SESSION_KEYS, &composite)
                .map_err(session_not_found)?;
            txn.delete(session.id())
        })?;
        tracing::debug!(user_id = %removed.user_id, "Session closed");
        Ok(())
    }

    /// Delete every session of `user_id`, returning how many were removed
    pub fn invalidate_user(&self, user_id: &str) -> Result<usize> {
        let removed = self.inner.sessions.write(|txn| {
            let sessions = txn.get_filtered(USERS, user_id)?;
            for session in &sessions {
                txn.delete(session.id())?;
            }
            Ok(sessions.len())
        })?;
        tracing::info!(user_id, removed, "Sessions invalidated");
        Ok(removed)
    }

    /// Delete every session whose `lastUsedAt` is before `oldest_allowed`
    pub fn purge(&self, oldest_allowed: i64) -> Result<usize> {
        purge_before(self.inner.sessions.as_ref(), oldest_allowed)
    }

    /// The user's sessions, most recently used first
    pub fn get_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let mut sessions = self
            .inner
            .sessions
            .read(|txn| txn.get_filtered(USERS, user_id))?;
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    /// Start the purge loop on the current tokio runtime
    pub fn spawn_purge_loop(&self) -> Result<()> {
        let sessions = self.inner.sessions.clone();
        let clock = self.inner.clock.clone();
        let ttl = self.inner.config.ttl();
        let interval = self.inner.config.purge_interval();
        self.inner
            .purge
            .spawn(move |shutdown| purge_loop(sessions, clock, ttl, interval, shutdown))
    }

    /// Whether the purge loop is running
    pub fn is_purging(&self) -> bool {
        self.inner.purge.is_running()
    }

    /// Stop the purge loop and release the collection
    pub async fn close(&self) -> Result<()> {
        self.inner.purge.shutdown().await;
        self.inner.sessions.close()
    }

    fn find(&self, composite: &str) -> Result<Session> {
        self.inner
            .sessions
            .read(|txn| txn.get_first(SESSION_KEYS, composite))
            .map_err(session_not_found)
    }

    fn touch(&self, composite: &str) -> Result<Session> {
        let now = self.inner.clock.unix_now();
        self.inner.sessions.write(|txn| {
            let session = txn
                .get_first(SESSION_KEYS, composite)
                .map_err(session_not_found)?;
            txn.update(session.id(), &mut |s: &mut Session| {
                s.last_used_at = now;
                Ok(())
            })
        })
    }
}

fn session_not_found(err: KeywardError) -> KeywardError {
    if err.is_not_found() {
        KeywardError::not_found("session not found")
    } else {
        err
    }
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn purge_before(sessions: &dyn Collection<Session>, oldest_allowed: i64) -> Result<usize> {
    sessions.write(|txn| {
        let mut removed = 0;
        for session in txn.all()? {
            if session.last_used_at < oldest_allowed {
                txn.delete(session.id())?;
                removed += 1;
            }
        }
        Ok(removed)
    })
}

async fn purge_loop(
    sessions: Arc<dyn Collection<Session>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let oldest_allowed = clock.unix_now().saturating_sub(secs(ttl));
                match purge_before(sessions.as_ref(), oldest_allowed) {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "Purged idle sessions"),
                    Err(err) => tracing::warn!(error = %err, "Session purge failed"),
                }
            }
        }
    }
}
