//! Keyward Authorization
//!
//! Answers "may this identity perform this action on this resource" by
//! composing dynamic group membership with per-resource bitmask ACLs.
//!
//! - [`Groups`]: persistent `userID -> groups` mapping
//! - [`Permissions`]: persistent `resourceKey -> (group -> Action)` mapping
//!   and the fail-closed [`Permissions::can`] check
//! - [`resolver`]: the pure resolution rule both sides feed into

#![forbid(unsafe_code)]

pub mod action;
pub mod errors;
pub mod groups;
pub mod permissions;
pub mod resolver;
pub mod resource;

pub use action::Action;
pub use errors::AuthzResult;
pub use groups::{GroupEntry, Groups};
pub use permissions::Permissions;
pub use resource::{resource_key, Pair, Resource};
