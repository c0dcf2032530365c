//! Unified error system for Keyward
//!
//! Every store and the credential facade report failures through a single
//! [`KeywardError`]. Store-layer failures propagate unchanged; domain checks
//! map onto the taxonomy below.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy shared by every Keyward store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum KeywardError {
    /// Aggregate (resource, session, SSO entry, group entry, ...) not found
    #[error("Not found: {message}")]
    NotFound {
        /// Which aggregate was looked up
        message: String,
    },

    /// One or more required fields failed validation
    #[error("Validation failed: {}", .errors.join("; "))]
    Validation {
        /// Every violation found, in the order checked
        errors: Vec<String>,
    },

    /// The operation conflicts with current state (consumed code, email in use)
    #[error("Conflict: {message}")]
    Conflict {
        /// What the operation collided with
        message: String,
    },

    /// Identity exists but is administratively deactivated
    #[error("Disabled: {message}")]
    Disabled {
        /// Which identity is disabled
        message: String,
    },

    /// A time-bounded credential was presented after its expiry
    #[error("Expired: {message}")]
    Expired {
        /// Which credential expired
        message: String,
    },

    /// Presented credentials did not match
    #[error("Invalid credentials: {message}")]
    InvalidCredentials {
        /// Which credential failed to match
        message: String,
    },

    /// Malformed input, configuration or stored value
    #[error("Invalid: {message}")]
    Invalid {
        /// What was malformed
        message: String,
    },

    /// The backing collection failed or is closed
    #[error("Storage error: {message}")]
    Storage {
        /// Backend detail
        message: String,
    },

    /// Broken internal invariant
    #[error("Internal error: {message}")]
    Internal {
        /// Invariant that did not hold
        message: String,
    },
}

impl KeywardError {
    /// `NotFound` for the named aggregate
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a validation error from a single violation
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![message.into()],
        }
    }

    /// `Conflict` with the current state
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// `Disabled` identity
    pub fn disabled(message: impl Into<String>) -> Self {
        Self::Disabled {
            message: message.into(),
        }
    }

    /// `Expired` credential
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Wrong password, key or session token
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    /// `Invalid` input
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// `Storage` backend failure
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// `Internal` invariant failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is `Validation`
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this is `Conflict`
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether this is `Disabled`
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled { .. })
    }

    /// Whether this is `Expired`
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

/// Result alias used throughout Keyward
pub type Result<T> = std::result::Result<T, KeywardError>;

/// Accumulates validation failures so callers see every violation at once.
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    errors: Vec<String>,
}

impl ValidationErrors {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn push(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(message.into());
        self
    }

    /// Record `message` when `field` is empty
    pub fn require(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        if field.is_empty() {
            self.errors.push(message.into());
        }
        self
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise a single `Validation` error
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(KeywardError::Validation {
                errors: self.errors,
            })
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors.join("; "))
    }
}

impl From<std::io::Error> for KeywardError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for KeywardError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid(format!("Invalid TOML: {err}"))
    }
}

impl From<serde_json::Error> for KeywardError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("Serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_its_subject() {
        let err = KeywardError::not_found("session");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: session");
    }

    #[test]
    fn validation_aggregates_every_violation() {
        let mut errs = ValidationErrors::new();
        errs.require("", "invalid user ID, cannot be empty")
            .require("name", "invalid name, cannot be empty")
            .require("", "invalid login code, cannot be empty");

        let err = errs.finish().unwrap_err();
        match &err {
            KeywardError::Validation { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "Validation failed: invalid user ID, cannot be empty; invalid login code, cannot be empty"
        );
    }

    #[test]
    fn empty_validation_is_ok() {
        assert!(ValidationErrors::new().finish().is_ok());
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(KeywardError::from(io_err).is_not_found());
    }
}
