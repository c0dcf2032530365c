//! Keyward Core - shared foundation
//!
//! Types and interfaces every Keyward crate builds on. Contains no store
//! implementations and no background tasks.
//!
//! - `errors`: unified [`KeywardError`] taxonomy and aggregated validation
//! - `entity`: shared [`EntityMeta`] value object and indexable relationships
//! - `store`: the collaborator store contract ([`Collection`], transactions)
//! - `effects`: injected [`Clock`], [`IdGenerator`] and [`PasswordHasher`]
//! - `config`: [`KeywardConfig`] loading, env overrides and validation

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Aggregate base fields and index relationships
pub mod entity;

/// Collaborator store contract
pub mod store;

/// Injected effect interfaces
pub mod effects;

/// Configuration loading and validation
pub mod config;

pub use config::KeywardConfig;
pub use effects::{Clock, IdGenerator, PasswordHasher, SystemClock, UuidGenerator};
pub use entity::{Entity, EntityMeta, Relationships};
pub use errors::{KeywardError, Result, ValidationErrors};
pub use store::{Collection, CollectionExt, ReadTxn, WriteTxn};
