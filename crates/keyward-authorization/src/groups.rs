//! Group membership store
//!
//! One [`GroupEntry`] per user, created lazily on the first grant. A user
//! without an entry belongs to no groups.

use crate::errors::{KeywardError, Result};
use keyward_core::store::{optional, CollectionExt};
use keyward_core::{Collection, Entity, EntityMeta, Relationships, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Index holding each entry's user id
pub const USERS: &str = "users";

/// Index holding every group name in the entry
pub const GROUPS: &str = "groups";

/// A user's group set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Id and timestamps
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Member user
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Group names, unordered
    pub groups: BTreeSet<String>,
}

impl GroupEntry {
    /// Empty entry for `user_id`
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

impl Entity for GroupEntry {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn relationships(&self) -> Relationships {
        Relationships::new()
            .with(USERS, self.user_id.clone())
            .with_many(GROUPS, self.groups.iter().cloned())
    }
}

/// Persistent `userID -> groups` mapping
#[derive(Clone)]
pub struct Groups {
    entries: Arc<dyn Collection<GroupEntry>>,
}

impl Groups {
    /// Create the store
    pub fn new(entries: Arc<dyn Collection<GroupEntry>>) -> Self {
        Self { entries }
    }

    /// Union `groups` into the user's set, creating the entry if needed
    pub fn add_groups<I, S>(&self, user_id: &str, groups: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups = validated(user_id, groups)?;

        let entry = self.entries.write(move |txn| {
            match optional(txn.get_first(USERS, user_id))? {
                Some(existing) if groups.is_subset(&existing.groups) => Ok(existing),
                Some(existing) => txn.update(existing.id(), &mut |entry: &mut GroupEntry| {
                    entry.groups.extend(groups.iter().cloned());
                    Ok(())
                }),
                None => {
                    let mut entry = GroupEntry::new(user_id);
                    entry.groups = groups;
                    txn.create(entry)
                }
            }
        })?;

        tracing::debug!(user_id, groups = ?entry.groups, "Groups added");
        Ok(entry.groups)
    }

    /// Subtract `groups` from the user's set; a user without an entry is a
    /// no-op returning the empty set
    pub fn remove_groups<I, S>(&self, user_id: &str, groups: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups = validated(user_id, groups)?;

        let remaining = self.entries.write(move |txn| {
            let Some(existing) = optional(txn.get_first(USERS, user_id))? else {
                return Ok(BTreeSet::new());
            };
            if existing.groups.is_disjoint(&groups) {
                return Ok(existing.groups);
            }
            let updated = txn.update(existing.id(), &mut |entry: &mut GroupEntry| {
                entry.groups.retain(|g| !groups.contains(g));
                Ok(())
            })?;
            Ok(updated.groups)
        })?;

        tracing::debug!(user_id, groups = ?remaining, "Groups removed");
        Ok(remaining)
    }

    /// The user's groups; empty when the user has no entry
    pub fn get(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let entry = self
            .entries
            .read(|txn| optional(txn.get_first(USERS, user_id)))?;
        Ok(entry.map(|e| e.groups).unwrap_or_default())
    }

    /// Whether the user belongs to `group`. Store failures read as `false`.
    pub fn has_group(&self, user_id: &str, group: &str) -> bool {
        match self.get(user_id) {
            Ok(groups) => groups.contains(group),
            Err(err) => {
                tracing::warn!(user_id, group, error = %err, "Group lookup failed");
                false
            }
        }
    }

    /// User ids of every member of `group`
    pub fn members(&self, group: &str) -> Result<Vec<String>> {
        let entries = self.entries.read(|txn| txn.get_filtered(GROUPS, group))?;
        Ok(entries.into_iter().map(|e| e.user_id).collect())
    }

    /// Every membership entry
    pub fn list(&self) -> Result<Vec<GroupEntry>> {
        self.entries.read(|txn| txn.all())
    }

    /// Visit every entry inside one read transaction
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&GroupEntry) -> Result<()> + Send,
    {
        self.entries.read(move |txn| {
            for entry in txn.all()? {
                f(&entry)?;
            }
            Ok(())
        })
    }

    /// Administrative hard delete of the user's entry
    pub fn remove_entry(&self, user_id: &str) -> Result<GroupEntry> {
        if user_id.is_empty() {
            return Err(KeywardError::validation("userID is required"));
        }
        let removed = self.entries.write(|txn| {
            let existing = txn.get_first(USERS, user_id)?;
            txn.delete(existing.id())
        })?;
        tracing::info!(user_id, "Group entry removed");
        Ok(removed)
    }

    /// Release the collection
    pub fn close(&self) -> Result<()> {
        self.entries.close()
    }
}

fn validated<I, S>(user_id: &str, groups: I) -> Result<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let groups: BTreeSet<String> = groups.into_iter().map(Into::into).collect();

    let mut errors = ValidationErrors::new();
    errors.require(user_id, "userID is required");
    if groups.is_empty() || groups.iter().any(String::is_empty) {
        errors.push("group names are required");
    }
    errors.finish()?;
    Ok(groups)
}
