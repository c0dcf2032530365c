//! Resource aggregate: `resourceKey -> (group -> action bitmask)`

use crate::action::Action;
use keyward_core::{Entity, EntityMeta, Relationships};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index holding each resource's key
pub const RESOURCE_KEYS: &str = "resourceKeys";

const KEY_SEPARATOR: &str = "::";

/// Build a resource key: `"<name>"` for a collection-wide grant,
/// `"<name>::<id>"` for an instance grant.
pub fn resource_key(name: &str, id: &str) -> String {
    if id.is_empty() {
        name.to_string()
    } else {
        format!("{name}{KEY_SEPARATOR}{id}")
    }
}

/// A group and the actions granted to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair<'a> {
    /// Group receiving the grant
    pub group: &'a str,
    /// Actions granted
    pub actions: Action,
}

impl<'a> Pair<'a> {
    /// Pair `group` with `actions`
    pub fn new(group: &'a str, actions: Action) -> Self {
        Self { group, actions }
    }
}

/// Per-resource access control list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Id and timestamps
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// `name` or `name::id`
    #[serde(rename = "resourceKey")]
    pub key: String,
    /// Granted actions per group
    pub groups: BTreeMap<String, Action>,
}

impl Resource {
    /// Resource with no grants
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Actions held by `group`, if it has an entry
    pub fn actions(&self, group: &str) -> Option<Action> {
        self.groups.get(group).copied()
    }

    /// Whether `group` holds any grant
    pub fn has(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Whether `group` holds the single action `requested`
    pub fn can(&self, group: &str, requested: Action) -> bool {
        self.actions(group)
            .is_some_and(|granted| granted.permits(requested))
    }

    /// Union `actions` into the group's bitmask.
    ///
    /// Returns `false` when the group already held every bit, in which case
    /// nothing changes.
    pub fn grant(&mut self, group: &str, actions: Action) -> bool {
        match self.groups.get_mut(group) {
            Some(current) if current.contains(actions) => false,
            Some(current) => {
                *current |= actions;
                true
            }
            None => {
                self.groups.insert(group.to_string(), actions);
                true
            }
        }
    }

    /// Drop the group's entry; `false` if it had none
    pub fn revoke(&mut self, group: &str) -> bool {
        self.groups.remove(group).is_some()
    }
}

impl Entity for Resource {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn relationships(&self) -> Relationships {
        Relationships::new().with(RESOURCE_KEYS, self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_keys() {
        assert_eq!(resource_key("posts", ""), "posts");
        assert_eq!(resource_key("posts", "42"), "posts::42");
    }

    #[test]
    fn grant_unions_bits() {
        let mut r = Resource::new("posts");
        assert!(r.grant("writers", Action::WRITE));
        assert!(r.grant("writers", Action::DELETE));
        assert!(!r.grant("writers", Action::WRITE));

        assert_eq!(r.actions("writers"), Some(Action::WRITE | Action::DELETE));
        assert!(r.can("writers", Action::WRITE));
        assert!(r.can("writers", Action::DELETE));
        assert!(!r.can("writers", Action::READ));
    }

    #[test]
    fn revoke_removes_entry() {
        let mut r = Resource::new("posts");
        r.grant("readers", Action::READ);
        assert!(r.revoke("readers"));
        assert!(!r.revoke("readers"));
        assert!(!r.has("readers"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let mut r = Resource::new("posts::1");
        r.grant("admins", Action::ADMIN);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["resourceKey"], "posts::1");
        assert_eq!(json["groups"]["admins"], 14);
    }
}
