//! In-memory collection handler
//!
//! Writers hold the collection's write lock for the whole unit of work and
//! apply changes in place, recording the inverse of each one. If the unit of
//! work returns `Err` or panics, the undo log is replayed newest first before
//! the lock is released. Readers share the read lock and never observe a
//! partial write. A write costs only the rows it touches.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::RwLock` because transaction bodies are synchronous and
//! the lock is never held across `.await` points.

use crate::table::Table;
use keyward_core::store::{ReadFn, WriteFn};
use keyward_core::{
    Clock, Collection, Entity, IdGenerator, KeywardError, ReadTxn, Result, WriteTxn,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory transactional collection of one aggregate type
pub struct MemoryCollection<T> {
    name: String,
    table: RwLock<Table<T>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl<T: Entity> MemoryCollection<T> {
    /// Create an empty collection
    pub fn new(name: impl Into<String>, ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            table: RwLock::new(Table::default()),
            ids,
            clock,
            closed: AtomicBool::new(false),
        }
    }

    /// Create an empty collection behind an `Arc`
    pub fn shared(
        name: impl Into<String>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self::new(name, ids, clock))
    }

    /// Number of committed entities
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Whether nothing is committed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KeywardError::storage(format!(
                "{} collection is closed",
                self.name
            )));
        }
        Ok(())
    }
}

impl<T: Entity> Collection<T> for MemoryCollection<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn transaction(&self, f: &mut WriteFn<'_, T>) -> Result<()> {
        self.ensure_open()?;
        let mut table = self.table.write();
        let mut txn = MemoryWriteTxn {
            name: &self.name,
            table: &mut *table,
            undo: Vec::new(),
            ids: self.ids.as_ref(),
            clock: self.clock.as_ref(),
        };

        let result = f(&mut txn);
        match &result {
            Ok(()) => txn.commit(),
            Err(err) => {
                tracing::trace!(collection = %self.name, error = %err, "Transaction rolled back");
            }
        }
        result
    }

    fn read_transaction(&self, f: &mut ReadFn<'_, T>) -> Result<()> {
        self.ensure_open()?;
        let table = self.table.read();
        let txn = MemoryReadTxn {
            name: &self.name,
            table: &*table,
        };
        f(&txn)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct MemoryReadTxn<'a, T> {
    name: &'a str,
    table: &'a Table<T>,
}

impl<T: Entity> ReadTxn<T> for MemoryReadTxn<'_, T> {
    fn get(&self, id: &str) -> Result<T> {
        self.table.get(self.name, id)
    }

    fn get_filtered(&self, index: &str, value: &str) -> Result<Vec<T>> {
        Ok(self.table.filtered(index, value))
    }

    fn first_ordered(&self, index: &str) -> Result<T> {
        self.table.first_ordered(self.name, index)
    }

    fn all(&self) -> Result<Vec<T>> {
        Ok(self.table.all())
    }
}

/// Inverse of one applied change
enum Undo<T> {
    /// Drop a row the transaction created
    Remove(String),
    /// Put back the row as it was before the transaction touched it
    Restore(T),
}

struct MemoryWriteTxn<'a, T: Entity> {
    name: &'a str,
    table: &'a mut Table<T>,
    undo: Vec<Undo<T>>,
    ids: &'a dyn IdGenerator,
    clock: &'a dyn Clock,
}

impl<T: Entity> MemoryWriteTxn<'_, T> {
    fn commit(&mut self) {
        self.undo.clear();
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::Remove(id) => {
                    let _ = self.table.remove(self.name, &id);
                }
                Undo::Restore(previous) => self.table.insert(previous),
            }
        }
    }
}

impl<T: Entity> Drop for MemoryWriteTxn<'_, T> {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl<T: Entity> ReadTxn<T> for MemoryWriteTxn<'_, T> {
    fn get(&self, id: &str) -> Result<T> {
        self.table.get(self.name, id)
    }

    fn get_filtered(&self, index: &str, value: &str) -> Result<Vec<T>> {
        Ok(self.table.filtered(index, value))
    }

    fn first_ordered(&self, index: &str) -> Result<T> {
        self.table.first_ordered(self.name, index)
    }

    fn all(&self) -> Result<Vec<T>> {
        Ok(self.table.all())
    }
}

impl<T: Entity> WriteTxn<T> for MemoryWriteTxn<'_, T> {
    fn create(&mut self, mut entity: T) -> Result<T> {
        let now = self.clock.unix_now();
        let meta = entity.meta_mut();
        if meta.id.is_empty() {
            meta.id = self.ids.generate();
        }
        if self.table.contains(&meta.id) {
            return Err(KeywardError::conflict(format!(
                "{} entry {} already exists",
                self.name, meta.id
            )));
        }
        meta.created_at = now;
        meta.updated_at = now;

        self.table.insert(entity.clone());
        self.undo.push(Undo::Remove(entity.id().to_string()));
        Ok(entity)
    }

    fn put(&mut self, entity: &T) -> Result<T> {
        let existing = self.table.get(self.name, entity.id())?;
        let mut updated = entity.clone();
        let meta = updated.meta_mut();
        meta.created_at = existing.meta().created_at;
        meta.updated_at = self.clock.unix_now();

        self.table.insert(updated.clone());
        self.undo.push(Undo::Restore(existing));
        Ok(updated)
    }

    fn update(&mut self, id: &str, mutator: &mut dyn FnMut(&mut T) -> Result<()>) -> Result<T> {
        let mut entity = self.table.get(self.name, id)?;
        mutator(&mut entity)?;
        // The mutator may not re-key the entity
        entity.meta_mut().id = id.to_string();
        self.put(&entity)
    }

    fn delete(&mut self, id: &str) -> Result<T> {
        let removed = self.table.remove(self.name, id)?;
        self.undo.push(Undo::Restore(removed.clone()));
        Ok(removed)
    }

    fn as_read(&self) -> &dyn ReadTxn<T> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::store::CollectionExt;
    use keyward_core::{EntityMeta, Relationships};
    use std::sync::atomic::AtomicU64;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        meta: EntityMeta,
        owner: String,
        rank: i64,
    }

    impl Entity for Note {
        fn meta(&self) -> &EntityMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }

        fn relationships(&self) -> Relationships {
            Relationships::new()
                .with("owners", self.owner.clone())
                .with("ranks", keyward_core::entity::ordered_timestamp(self.rank))
        }
    }

    struct Counter(AtomicU64);

    impl IdGenerator for Counter {
        fn generate(&self) -> String {
            format!("id_{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<chrono::Utc> {
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
        }
    }

    fn notes() -> MemoryCollection<Note> {
        MemoryCollection::new("notes", Arc::new(Counter(AtomicU64::new(0))), Arc::new(FixedClock))
    }

    fn note(owner: &str, rank: i64) -> Note {
        Note {
            owner: owner.to_string(),
            rank,
            ..Default::default()
        }
    }

    #[test]
    fn create_assigns_id_and_timestamps() {
        let c = notes();
        let created = c.write(|txn| txn.create(note("alice", 1))).unwrap();

        assert_eq!(created.meta.id, "id_0");
        assert_eq!(created.meta.created_at, 1_700_000_000);
        assert_eq!(c.read(|txn| txn.get("id_0")).unwrap(), created);
    }

    #[test]
    fn failed_transaction_writes_nothing() {
        let c = notes();
        let result: Result<()> = c.write(|txn| {
            txn.create(note("alice", 1))?;
            Err(KeywardError::internal("boom"))
        });

        assert!(result.is_err());
        assert!(c.is_empty());
    }

    #[test]
    fn failed_transaction_undoes_every_change() {
        let c = notes();
        let kept = c.write(|txn| txn.create(note("alice", 1))).unwrap();
        let doomed = c.write(|txn| txn.create(note("bob", 2))).unwrap();

        let result: Result<()> = c.write(|txn| {
            txn.update(&kept.meta.id, &mut |n: &mut Note| {
                n.owner = "carol".to_string();
                Ok(())
            })?;
            txn.delete(&doomed.meta.id)?;
            txn.create(note("dave", 0))?;
            Err(KeywardError::internal("boom"))
        });
        assert!(result.is_err());

        assert_eq!(c.len(), 2);
        assert_eq!(c.read(|txn| txn.get(&kept.meta.id)).unwrap(), kept);
        assert_eq!(c.read(|txn| txn.get(&doomed.meta.id)).unwrap(), doomed);
        assert!(c.read(|txn| txn.get_filtered("owners", "carol")).unwrap().is_empty());
        assert!(c.read(|txn| txn.get_filtered("owners", "dave")).unwrap().is_empty());
        assert_eq!(c.read(|txn| txn.first_ordered("ranks")).unwrap(), kept);
    }

    #[test]
    fn panicking_transaction_is_rolled_back() {
        let c = notes();
        let created = c.write(|txn| txn.create(note("alice", 1))).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = c.write(|txn| {
                txn.delete(&created.meta.id)?;
                panic!("unit of work panicked");
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(c.read(|txn| txn.get_first("owners", "alice")).unwrap(), created);
    }

    #[test]
    fn index_follows_updates_and_deletes() {
        let c = notes();
        let created = c.write(|txn| txn.create(note("alice", 1))).unwrap();

        c.write(|txn| {
            txn.update(&created.meta.id, &mut |n: &mut Note| {
                n.owner = "bob".to_string();
                Ok(())
            })
        })
        .unwrap();

        let by_alice = c.read(|txn| txn.get_filtered("owners", "alice")).unwrap();
        let by_bob = c.read(|txn| txn.get_filtered("owners", "bob")).unwrap();
        assert!(by_alice.is_empty());
        assert_eq!(by_bob.len(), 1);

        c.write(|txn| txn.delete(&created.meta.id)).unwrap();
        let err = c.read(|txn| txn.get_first("owners", "bob")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn first_ordered_returns_lowest_value() {
        let c = notes();
        c.write(|txn| {
            txn.create(note("a", 30))?;
            txn.create(note("b", 10))?;
            txn.create(note("c", 20))
        })
        .unwrap();

        let first = c.read(|txn| txn.first_ordered("ranks")).unwrap();
        assert_eq!(first.owner, "b");
    }

    #[test]
    fn first_ordered_on_empty_is_not_found() {
        let c = notes();
        let err = c.read(|txn| txn.first_ordered("ranks")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn closed_collection_rejects_work() {
        let c = notes();
        c.close().unwrap();
        let err = c.read(|txn| txn.all()).unwrap_err();
        assert!(matches!(err, KeywardError::Storage { .. }));
    }
}
