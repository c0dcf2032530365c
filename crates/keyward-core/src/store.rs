//! Collaborator store contract
//!
//! Keyward does not own a database. It consumes a transactional,
//! secondary-index-capable collection per aggregate type through the traits
//! below. Index queries are equality matches only, plus
//! [`ReadTxn::first_ordered`] which returns the entity holding the lowest value
//! for an index.
//!
//! Transactions are all-or-nothing: if the unit of work returns `Err`, nothing
//! it wrote is observable.

use crate::entity::Entity;
use crate::errors::{KeywardError, Result};

/// Read-only view of a collection inside a transaction
pub trait ReadTxn<T: Entity> {
    /// Fetch by primary key
    fn get(&self, id: &str) -> Result<T>;

    /// All entities whose `index` relationship contains `value`
    fn get_filtered(&self, index: &str, value: &str) -> Result<Vec<T>>;

    /// Entity with the lowest value for `index`
    fn first_ordered(&self, index: &str) -> Result<T>;

    /// Every entity in primary-key order
    fn all(&self) -> Result<Vec<T>>;

    /// First entity matching `index == value`, `NotFound` when there is none
    fn get_first(&self, index: &str, value: &str) -> Result<T> {
        self.get_filtered(index, value)?
            .into_iter()
            .next()
            .ok_or_else(|| KeywardError::not_found(format!("no entry where {index} = {value}")))
    }
}

/// Read-write view of a collection inside a transaction
pub trait WriteTxn<T: Entity>: ReadTxn<T> {
    /// Insert a new entity; the store assigns its id and timestamps
    fn create(&mut self, entity: T) -> Result<T>;

    /// Overwrite an existing entity by its id
    fn put(&mut self, entity: &T) -> Result<T>;

    /// Apply `mutator` to the stored entity and persist the result
    fn update(&mut self, id: &str, mutator: &mut dyn FnMut(&mut T) -> Result<()>) -> Result<T>;

    /// Remove by primary key, returning the removed entity
    fn delete(&mut self, id: &str) -> Result<T>;

    /// This transaction as a read-only view
    fn as_read(&self) -> &dyn ReadTxn<T>;
}

/// Unit of work over a read-write transaction
pub type WriteFn<'a, T> = dyn FnMut(&mut dyn WriteTxn<T>) -> Result<()> + Send + 'a;

/// Unit of work over a read-only transaction
pub type ReadFn<'a, T> = dyn FnMut(&dyn ReadTxn<T>) -> Result<()> + Send + 'a;

/// A typed collection of one aggregate kind.
pub trait Collection<T: Entity>: Send + Sync {
    /// Collection name used in logs and errors
    fn name(&self) -> &str;

    /// Run `f` inside a read-write transaction
    fn transaction(&self, f: &mut WriteFn<'_, T>) -> Result<()>;

    /// Run `f` inside a read-only transaction
    fn read_transaction(&self, f: &mut ReadFn<'_, T>) -> Result<()>;

    /// Run `f` as a batched write; backends may coalesce concurrent batches
    fn batch(&self, f: &mut WriteFn<'_, T>) -> Result<()> {
        self.transaction(f)
    }

    /// Release backend resources
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Typed-return helpers over [`Collection`].
pub trait CollectionExt<T: Entity>: Collection<T> {
    /// Read-write transaction returning a value
    fn write<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce(&mut dyn WriteTxn<T>) -> Result<R> + Send,
    {
        let mut f = Some(f);
        let mut out = None;
        self.transaction(&mut |txn| {
            let f = f
                .take()
                .ok_or_else(|| KeywardError::internal("transaction body invoked twice"))?;
            out = Some(f(txn)?);
            Ok(())
        })?;
        out.ok_or_else(|| KeywardError::internal("transaction produced no result"))
    }

    /// Batched write returning a value
    fn batch_write<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce(&mut dyn WriteTxn<T>) -> Result<R> + Send,
    {
        let mut f = Some(f);
        let mut out = None;
        self.batch(&mut |txn| {
            let f = f
                .take()
                .ok_or_else(|| KeywardError::internal("batch body invoked twice"))?;
            out = Some(f(txn)?);
            Ok(())
        })?;
        out.ok_or_else(|| KeywardError::internal("batch produced no result"))
    }

    /// Read-only transaction returning a value
    fn read<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: FnOnce(&dyn ReadTxn<T>) -> Result<R> + Send,
    {
        let mut f = Some(f);
        let mut out = None;
        self.read_transaction(&mut |txn| {
            let f = f
                .take()
                .ok_or_else(|| KeywardError::internal("read body invoked twice"))?;
            out = Some(f(txn)?);
            Ok(())
        })?;
        out.ok_or_else(|| KeywardError::internal("read produced no result"))
    }
}

impl<T: Entity, C: Collection<T> + ?Sized> CollectionExt<T> for C {}

/// Maps a `NotFound` outcome to `None`, leaving other errors intact.
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}
