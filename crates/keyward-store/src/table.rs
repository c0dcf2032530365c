//! Row storage plus secondary index for a single collection

use keyward_core::{Entity, KeywardError, Result};
use std::collections::{BTreeMap, BTreeSet};

type IndexKey = (String, String);

/// Rows keyed by id and an `(index, value) -> ids` secondary index.
#[derive(Debug)]
pub(crate) struct Table<T> {
    rows: BTreeMap<String, T>,
    index: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<T: Entity> Table<T> {
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn get(&self, name: &str, id: &str) -> Result<T> {
        self.rows
            .get(id)
            .cloned()
            .ok_or_else(|| KeywardError::not_found(format!("{name} entry {id}")))
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    pub(crate) fn filtered(&self, index: &str, value: &str) -> Vec<T> {
        let key = (index.to_string(), value.to_string());
        self.index
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.rows.get(id).cloned())
            .collect()
    }

    pub(crate) fn first_ordered(&self, name: &str, index: &str) -> Result<T> {
        let start = (index.to_string(), String::new());
        self.index
            .range(start..)
            .take_while(|((idx, _), _)| idx == index)
            .flat_map(|(_, ids)| ids.iter())
            .find_map(|id| self.rows.get(id).cloned())
            .ok_or_else(|| KeywardError::not_found(format!("{name} has no entries for {index}")))
    }

    pub(crate) fn all(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }

    pub(crate) fn insert(&mut self, entity: T) {
        let id = entity.id().to_string();
        if let Some(previous) = self.rows.remove(&id) {
            self.unindex(&previous);
        }
        self.index_entity(&entity);
        self.rows.insert(id, entity);
    }

    pub(crate) fn remove(&mut self, name: &str, id: &str) -> Result<T> {
        let removed = self
            .rows
            .remove(id)
            .ok_or_else(|| KeywardError::not_found(format!("{name} entry {id}")))?;
        self.unindex(&removed);
        Ok(removed)
    }

    fn index_entity(&mut self, entity: &T) {
        let id = entity.id().to_string();
        for (index, value) in entity.relationships().iter() {
            self.index
                .entry((index.to_string(), value.to_string()))
                .or_default()
                .insert(id.clone());
        }
    }

    fn unindex(&mut self, entity: &T) {
        let id = entity.id();
        for (index, value) in entity.relationships().iter() {
            let key = (index.to_string(), value.to_string());
            if let Some(ids) = self.index.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.index.remove(&key);
                }
            }
        }
    }
}
