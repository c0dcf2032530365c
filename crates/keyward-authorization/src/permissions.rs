//! Resource ACL store
//!
//! Grants are unioned into a group's bitmask: granting `DELETE` to a group
//! that holds `WRITE` leaves it with `WRITE | DELETE`. A grant that adds no
//! new bit does not write.
//!
//! [`Permissions::can`] reads the resource and then the user's groups in two
//! separate read transactions. The two reads are not mutually consistent.
//! It fails closed.

use crate::action::Action;
use crate::errors::{KeywardError, Result};
use crate::groups::Groups;
use crate::resolver;
use crate::resource::{Pair, Resource, RESOURCE_KEYS};
use keyward_core::store::{optional, CollectionExt};
use keyward_core::{Collection, Entity, ValidationErrors};
use std::sync::Arc;

/// Per-resource access control lists plus the group store they resolve
/// against
#[derive(Clone)]
pub struct Permissions {
    resources: Arc<dyn Collection<Resource>>,
    groups: Groups,
}

impl Permissions {
    /// Create the store, resolving callers through `groups`
    pub fn new(resources: Arc<dyn Collection<Resource>>, groups: Groups) -> Self {
        Self { resources, groups }
    }

    /// The group store used for resolution
    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    /// Look up by resource id
    pub fn get(&self, resource_id: &str) -> Result<Resource> {
        self.resources.read(|txn| txn.get(resource_id))
    }

    /// Look up by resource key
    pub fn get_by_key(&self, resource_key: &str) -> Result<Resource> {
        self.resources
            .read(|txn| txn.get_first(RESOURCE_KEYS, resource_key))
            .map_err(|err| {
                if err.is_not_found() {
                    KeywardError::not_found(format!("resource {resource_key} not found"))
                } else {
                    err
                }
            })
    }

    /// Grant `actions` to `group` on `resource_key`
    pub fn set_permissions(
        &self,
        resource_key: &str,
        group: &str,
        actions: Action,
    ) -> Result<Resource> {
        self.set_multi_permissions(resource_key, &[Pair::new(group, actions)])
    }

    /// Apply several grants to one resource in a single transaction
    pub fn set_multi_permissions(
        &self,
        resource_key: &str,
        pairs: &[Pair<'_>],
    ) -> Result<Resource> {
        let mut errors = ValidationErrors::new();
        errors.require(resource_key, "resourceKey is required");
        if pairs.is_empty() || pairs.iter().any(|p| p.group.is_empty()) {
            errors.push("group names are required");
        }
        errors.finish()?;

        let resource = self.resources.write(move |txn| {
            match optional(txn.get_first(RESOURCE_KEYS, resource_key))? {
                Some(mut existing) => {
                    let mut changed = false;
                    for pair in pairs {
                        changed |= existing.grant(pair.group, pair.actions);
                    }
                    if changed {
                        txn.put(&existing)
                    } else {
                        Ok(existing)
                    }
                }
                None => {
                    let mut resource = Resource::new(resource_key);
                    for pair in pairs {
                        resource.grant(pair.group, pair.actions);
                    }
                    txn.create(resource)
                }
            }
        })?;

        tracing::debug!(resource_key, groups = ?resource.groups, "Permissions set");
        Ok(resource)
    }

    /// Remove the group's entry; a missing resource or entry is a no-op
    pub fn unset_permissions(&self, resource_key: &str, group: &str) -> Result<()> {
        self.unset_multi_permissions(resource_key, &[group])
    }

    /// Remove several groups' entries in a single transaction
    pub fn unset_multi_permissions(&self, resource_key: &str, groups: &[&str]) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require(resource_key, "resourceKey is required");
        if groups.is_empty() || groups.iter().any(|g| g.is_empty()) {
            errors.push("group names are required");
        }
        errors.finish()?;

        self.resources.write(move |txn| {
            let Some(mut existing) = optional(txn.get_first(RESOURCE_KEYS, resource_key))? else {
                return Ok(());
            };
            let mut changed = false;
            for group in groups {
                changed |= existing.revoke(group);
            }
            if changed {
                txn.put(&existing)?;
            }
            Ok(())
        })?;

        tracing::debug!(resource_key, ?groups, "Permissions unset");
        Ok(())
    }

    /// Delete the whole resource aggregate
    pub fn remove_resource(&self, resource_key: &str) -> Result<Resource> {
        let removed = self.resources.write(|txn| {
            let existing = txn.get_first(RESOURCE_KEYS, resource_key)?;
            txn.delete(existing.id())
        })?;
        tracing::info!(resource_key, "Resource removed");
        Ok(removed)
    }

    /// Whether `group` has an entry on the resource. Fails closed.
    pub fn has(&self, resource_key: &str, group: &str) -> bool {
        match self.get_by_key(resource_key) {
            Ok(resource) => resource.has(group),
            Err(err) if err.is_not_found() => false,
            Err(err) => {
                tracing::warn!(resource_key, group, error = %err, "Permission lookup failed");
                false
            }
        }
    }

    /// Whether any of the user's groups holds the single action `action` on
    /// `resource_key`. Any failure yields `false`.
    pub fn can(&self, user_id: &str, resource_key: &str, action: Action) -> bool {
        if !action.is_single() {
            tracing::debug!(resource_key, %action, "Rejecting compound permission check");
            return false;
        }

        let resource = match self.get_by_key(resource_key) {
            Ok(resource) => resource,
            Err(err) if err.is_not_found() => return false,
            Err(err) => {
                tracing::warn!(user_id, resource_key, error = %err, "Resource lookup failed");
                return false;
            }
        };

        let groups = match self.groups.get(user_id) {
            Ok(groups) => groups,
            Err(err) => {
                tracing::warn!(user_id, resource_key, error = %err, "Group lookup failed");
                return false;
            }
        };

        resolver::resolve(&resource, &groups, action)
    }

    /// Release the collection
    pub fn close(&self) -> Result<()> {
        self.resources.close()
    }
}
