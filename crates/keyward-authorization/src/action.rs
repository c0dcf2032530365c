//! Permission action bitmask
//!
//! A stored grant is any union of [`Action::READ`], [`Action::WRITE`] and
//! [`Action::DELETE`]. A permission check asks about exactly one of them.

use crate::errors::{KeywardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of actions a group may perform on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Action(u8);

impl Action {
    /// Explicitly no access
    pub const NONE: Action = Action(1);
    /// View a resource
    pub const READ: Action = Action(1 << 1);
    /// Create or modify a resource
    pub const WRITE: Action = Action(1 << 2);
    /// Remove a resource
    pub const DELETE: Action = Action(1 << 3);

    /// Read and Write
    pub const READ_WRITE: Action = Action(Self::READ.0 | Self::WRITE.0);

    /// Everything an administrator may do
    pub const ADMIN: Action = Action(Self::READ.0 | Self::WRITE.0 | Self::DELETE.0);

    const ALL_BITS: u8 = Self::NONE.0 | Self::ADMIN.0;

    /// Build from raw bits, rejecting zero and unknown bits
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits == 0 || bits & !Self::ALL_BITS != 0 {
            return Err(KeywardError::invalid(format!("invalid actions: {bits:#06b}")));
        }
        Ok(Action(bits))
    }

    /// Raw wire value
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`
    pub fn contains(self, other: Action) -> bool {
        self.0 & other.0 == other.0
    }

    /// Exactly one of READ, WRITE or DELETE
    pub fn is_single(self) -> bool {
        matches!(self, Self::READ | Self::WRITE | Self::DELETE)
    }

    /// Whether a grant of `self` permits the single action `requested`.
    ///
    /// Compound requests and `NONE` never permit anything.
    pub fn permits(self, requested: Action) -> bool {
        requested.is_single() && self.contains(requested)
    }

    /// Map an HTTP-style method to the action it needs
    pub fn for_method(method: &str) -> Option<Action> {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" | "OPTIONS" => Some(Self::READ),
            "POST" | "PUT" | "PATCH" => Some(Self::WRITE),
            "DELETE" => Some(Self::DELETE),
            _ => None,
        }
    }
}

impl BitOr for Action {
    type Output = Action;

    fn bitor(self, rhs: Action) -> Action {
        Action(self.0 | rhs.0)
    }
}

impl BitOrAssign for Action {
    fn bitor_assign(&mut self, rhs: Action) {
        self.0 |= rhs.0;
    }
}

impl TryFrom<u8> for Action {
    type Error = KeywardError;

    fn try_from(bits: u8) -> Result<Self> {
        Action::from_bits(bits)
    }
}

impl From<Action> for u8 {
    fn from(action: Action) -> u8 {
        action.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::NONE) {
            names.push("none");
        }
        if self.contains(Self::READ) {
            names.push("read");
        }
        if self.contains(Self::WRITE) {
            names.push("write");
        }
        if self.contains(Self::DELETE) {
            names.push("delete");
        }
        write!(f, "{}", names.join("|"))
    }
}
