//! SSO entry aggregate and its expiry indexes
//!
//! The store only answers equality queries, so expiry is indexed three ways:
//! by hour bucket and day bucket for "expired within the previous hour/day"
//! sweeps, and by a zero-padded millisecond timestamp whose lowest value is
//! the next entry to expire.

use chrono::{DateTime, Utc};
use keyward_core::entity::ordered_timestamp;
use keyward_core::{Entity, EntityMeta, Relationships};
use serde::{Deserialize, Serialize};

/// Index holding the owning user id
pub const USERS: &str = "users";
/// Index holding the login code
pub const LOGIN_CODES: &str = "loginCodes";
/// Index holding the expiry hour bucket
pub const EXPIRES_AT_HOURS: &str = "expiresAtHours";
/// Index holding the expiry day bucket
pub const EXPIRES_AT_DATES: &str = "expiresAtDates";
/// Ordered index on the expiry timestamp
pub const EXPIRES_AT: &str = "expiresAtTimestamps";

/// Bucket label for the hour containing `at`
pub fn hour_bucket(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H").to_string()
}

/// Bucket label for the day containing `at`
pub fn day_bucket(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// A login code bound to a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Id and timestamps
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// User the code logs in
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Single-use opaque code
    #[serde(rename = "loginCode")]
    pub login_code: String,
    /// Instant the code stops working
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl Entry {
    /// Expired at or before `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Entity for Entry {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn relationships(&self) -> Relationships {
        Relationships::new()
            .with(USERS, self.user_id.clone())
            .with(LOGIN_CODES, self.login_code.clone())
            .with(EXPIRES_AT_HOURS, hour_bucket(self.expires_at))
            .with(EXPIRES_AT_DATES, day_bucket(self.expires_at))
            .with(EXPIRES_AT, ordered_timestamp(self.expires_at.timestamp_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(hour_bucket(at), "2023-11-14T22");
        assert_eq!(day_bucket(at), "2023-11-14");
    }

    #[test]
    fn expiry_is_inclusive() {
        let at = DateTime::from_timestamp(1_000, 0).unwrap();
        let entry = Entry {
            expires_at: at,
            ..Default::default()
        };
        assert!(entry.is_expired(at));
        assert!(!entry.is_expired(at - chrono::Duration::seconds(1)));
    }
}
