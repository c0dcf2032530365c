//! Effect interfaces injected into every store at construction.
//!
//! - `Clock`: wall-clock time for expirations, refresh windows and timestamps
//! - `IdGenerator`: globally-unique opaque identifiers
//! - `PasswordHasher`: credential hashing, provided by the surrounding system

pub mod ids;
pub mod password;
pub mod time;

pub use ids::{IdGenerator, UuidGenerator};
pub use password::PasswordHasher;
pub use time::{Clock, SystemClock};
