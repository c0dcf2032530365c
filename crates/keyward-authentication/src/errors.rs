//! Authentication error handling
//!
//! Uses the unified [`KeywardError`] from keyward-core.

pub use keyward_core::{KeywardError, Result};

/// Reported by SSO login when the code matches no live entry
pub const NO_CODE_MATCH: &str = "no login code match was found";

/// Authentication result type alias
pub type AuthnResult<T> = Result<T>;

/// The conflict returned when a login code matches nothing
pub fn no_code_match() -> KeywardError {
    KeywardError::conflict(NO_CODE_MATCH)
}
