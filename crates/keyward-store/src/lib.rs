//! Keyward Store - in-memory collaborator store
//!
//! Implements the `keyward_core::store` contract entirely in memory:
//! all-or-nothing transactions, equality-match secondary indexes maintained
//! from each entity's relationships, and ordered first-by-index lookups.
//!
//! Deployments backed by a real database provide their own `Collection`
//! implementation; this crate is the reference backend used by the
//! in-memory facade and by tests.

#![forbid(unsafe_code)]

mod memory;
mod table;

pub use memory::MemoryCollection;
