//! API key store

use crate::errors::{KeywardError, Result};
use keyward_core::store::CollectionExt;
use keyward_core::{
    Clock, Collection, Entity, EntityMeta, IdGenerator, Relationships, ValidationErrors,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index holding each key value
pub const KEYS: &str = "keys";
/// Index holding the owning user id
pub const USERS: &str = "users";

/// A long-lived credential for service clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Id and timestamps
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Opaque secret presented by the client
    pub key: String,
    /// Owning user
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Human-readable label
    pub name: String,
    /// Unix seconds of the last successful use
    #[serde(rename = "lastUsedAt", default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
}

impl Entity for ApiKey {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn relationships(&self) -> Relationships {
        Relationships::new()
            .with(KEYS, self.key.clone())
            .with(USERS, self.user_id.clone())
    }
}

/// API key store
#[derive(Clone)]
pub struct ApiKeys {
    keys: Arc<dyn Collection<ApiKey>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl ApiKeys {
    /// Create the store
    pub fn new(
        keys: Arc<dyn Collection<ApiKey>>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { keys, ids, clock }
    }

    /// Issue a key named `name` for `user_id`
    pub fn new_key(&self, user_id: &str, name: &str) -> Result<ApiKey> {
        let mut errors = ValidationErrors::new();
        errors
            .require(user_id, "userID is required")
            .require(name, "name is required");
        errors.finish()?;

        let key = ApiKey {
            key: self.ids.generate(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            ..Default::default()
        };
        let key = self.keys.write(move |txn| txn.create(key))?;
        tracing::debug!(user_id, name, "API key issued");
        Ok(key)
    }

    /// Look up by key value
    pub fn get(&self, key: &str) -> Result<ApiKey> {
        self.keys
            .read(|txn| txn.get_first(KEYS, key))
            .map_err(key_not_found)
    }

    /// Every key owned by `user_id`
    pub fn get_by_user(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        self.keys.read(|txn| txn.get_filtered(USERS, user_id))
    }

    /// Rename a key
    pub fn update_name(&self, key: &str, name: &str) -> Result<ApiKey> {
        if name.is_empty() {
            return Err(KeywardError::validation("name is required"));
        }
        self.modify(key, |k| k.name = name.to_string())
    }

    /// Record a use of the key
    pub fn touch(&self, key: &str) -> Result<ApiKey> {
        let now = self.clock.unix_now();
        self.modify(key, |k| k.last_used_at = Some(now))
    }

    /// Revoke a key
    pub fn remove(&self, key: &str) -> Result<ApiKey> {
        let removed = self
            .keys
            .write(|txn| {
                let existing = txn.get_first(KEYS, key)?;
                txn.delete(existing.id())
            })
            .map_err(key_not_found)?;
        tracing::debug!(user_id = %removed.user_id, "API key removed");
        Ok(removed)
    }

    /// Release the collection
    pub fn close(&self) -> Result<()> {
        self.keys.close()
    }

    fn modify<F>(&self, key: &str, mut f: F) -> Result<ApiKey>
    where
        F: FnMut(&mut ApiKey) + Send,
    {
        self.keys
            .write(move |txn| {
                let existing = txn.get_first(KEYS, key)?;
                txn.update(existing.id(), &mut |k: &mut ApiKey| {
                    f(k);
                    Ok(())
                })
            })
            .map_err(key_not_found)
    }
}

fn key_not_found(err: KeywardError) -> KeywardError {
    if err.is_not_found() {
        KeywardError::not_found("api key not found")
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_testkit::TestEffects;

    fn store(effects: &TestEffects) -> ApiKeys {
        ApiKeys::new(effects.collection("apikeys"), effects.ids.clone(), effects.clock())
    }

    #[test]
    fn issue_rename_touch_remove() {
        let effects = TestEffects::manual(5_000);
        let keys = store(&effects);

        let issued = keys.new_key("user_0", "primary").unwrap();
        assert_eq!(keys.get(&issued.key).unwrap().name, "primary");

        let renamed = keys.update_name(&issued.key, "ci").unwrap();
        assert_eq!(renamed.name, "ci");

        effects.clock.advance_secs(10);
        assert_eq!(keys.touch(&issued.key).unwrap().last_used_at, Some(5_010));

        assert_eq!(keys.get_by_user("user_0").unwrap().len(), 1);
        keys.remove(&issued.key).unwrap();
        assert!(keys.get(&issued.key).unwrap_err().is_not_found());
    }

    #[test]
    fn validation_is_aggregated() {
        let effects = TestEffects::manual(5_000);
        match store(&effects).new_key("", "") {
            Err(KeywardError::Validation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
