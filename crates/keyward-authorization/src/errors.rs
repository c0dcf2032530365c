//! Authorization error handling
//!
//! Uses the unified [`KeywardError`] from keyward-core.

pub use keyward_core::{KeywardError, Result};

/// Authorization result type alias
pub type AuthzResult<T> = Result<T>;
