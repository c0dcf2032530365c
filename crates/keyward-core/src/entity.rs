//! Aggregate base fields and indexable relationships
//!
//! Every aggregate embeds an [`EntityMeta`] and describes its secondary-index
//! values through [`Entity::relationships`]. There is no shared base type;
//! each aggregate implements the trait on its own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity and bookkeeping timestamps shared by all stored aggregates.
///
/// `id` is assigned by the store on create; timestamps are Unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Primary key
    pub id: String,
    /// Set on create
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    /// Set on every write
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

impl EntityMeta {
    /// Whether the store has assigned an id
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Secondary-index values for one entity, keyed by index name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    values: BTreeMap<&'static str, Vec<String>>,
}

impl Relationships {
    /// No index values
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single value under `index`
    pub fn with(mut self, index: &'static str, value: impl Into<String>) -> Self {
        self.values.entry(index).or_default().push(value.into());
        self
    }

    /// Add every value in `values` under `index`
    pub fn with_many<I, S>(mut self, index: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.values.entry(index).or_default();
        slot.extend(values.into_iter().map(Into::into));
        self
    }

    /// Iterate `(index, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.values
            .iter()
            .flat_map(|(index, values)| values.iter().map(move |v| (*index, v.as_str())))
    }

    /// Values recorded under `index`
    pub fn get(&self, index: &str) -> &[String] {
        self.values.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A stored aggregate.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Id and timestamps
    fn meta(&self) -> &EntityMeta;

    /// Mutable id and timestamps, written by the store
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Values this entity is indexed under
    fn relationships(&self) -> Relationships;

    /// Primary key
    fn id(&self) -> &str {
        &self.meta().id
    }
}

/// Zero-padded so lexical index order equals numeric order.
pub fn ordered_timestamp(millis: i64) -> String {
    format!("{:020}", millis.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationships_iterate_in_index_order() {
        let r = Relationships::new()
            .with("users", "user_1")
            .with_many("groups", ["admins", "writers"]);

        let pairs: Vec<_> = r.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("groups", "admins"),
                ("groups", "writers"),
                ("users", "user_1")
            ]
        );
        assert_eq!(r.get("users"), ["user_1".to_string()]);
        assert!(r.get("missing").is_empty());
    }

    #[test]
    fn ordered_timestamps_sort_numerically() {
        assert!(ordered_timestamp(999) < ordered_timestamp(1_000));
        assert_eq!(ordered_timestamp(-5), ordered_timestamp(0));
    }
}
