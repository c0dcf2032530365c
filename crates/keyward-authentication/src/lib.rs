//! Keyward Authentication
//!
//! Ephemeral credential lifecycles for "is this caller who they claim to be":
//!
//! - [`Sessions`]: `(key, token)` sessions with sliding refresh and a
//!   fixed-interval purge loop
//! - [`SsoCodes`]: single- and multi-use login codes with an event-driven
//!   expiration scheduler
//! - [`ApiKeys`]: long-lived named keys
//! - [`Users`]: accounts, credential matching and [`AccountEvent`]s
//!
//! The purge loop and the scheduler are the only background tasks. Both are
//! spawned explicitly and stopped by the owning store's `close`.

#![forbid(unsafe_code)]

pub mod apikeys;
pub mod errors;
pub mod events;
pub mod sessions;
pub mod sso;
pub mod users;

mod tasks;

pub use apikeys::{ApiKey, ApiKeys};
pub use errors::{AuthnResult, NO_CODE_MATCH};
pub use events::{AccountEvent, EventBus};
pub use sessions::{session_key, Session, SessionPair, Sessions};
pub use sso::{Entry, SsoCodes};
pub use users::{User, Users};
