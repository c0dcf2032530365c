//! Keyward - multi-tenant authentication and authorization
//!
//! [`Keyward`] answers "who is this caller" from a session or API key and
//! "may they do this" from group membership and per-resource ACLs.
//!
//! ```rust,no_run
//! use keyward_app::{Credentials, Keyward};
//! use keyward_core::{KeywardConfig, SystemClock, UuidGenerator};
//! # fn hasher() -> std::sync::Arc<dyn keyward_core::PasswordHasher> { unimplemented!() }
//!
//! # async fn run() -> keyward_core::Result<()> {
//! let keyward = Keyward::in_memory(
//!     KeywardConfig::default(),
//!     SystemClock::shared(),
//!     UuidGenerator::shared(),
//!     hasher(),
//! )?;
//! let account = keyward.create_user("a@example.com", "secret1", ["writers"])?;
//! let user_id = keyward.resolve(&Credentials::api_key(account.api_key.key))?;
//! assert!(keyward.check(&user_id, "user", &user_id, "GET"));
//! keyward.close().await
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod credentials;
pub mod keyward;
pub mod logging;

pub use credentials::Credentials;
pub use keyward::{Keyward, LoggedIn, NewAccount, Stores, PRIMARY_KEY_NAME, USER_RESOURCE};
pub use logging::init_tracing;

pub use keyward_authentication as authentication;
pub use keyward_authorization as authorization;
pub use keyward_authorization::{resource_key, Action};
pub use keyward_core::{KeywardConfig, KeywardError, Result};
