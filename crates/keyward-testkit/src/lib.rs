//! Keyward Testing Infrastructure
//!
//! Deterministic effect implementations and small fixtures shared by the
//! test suites of every Keyward crate.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! keyward-testkit = { path = "../keyward-testkit" }
//! ```
//!
//! ```rust,no_run
//! use keyward_testkit::*;
//!
//! let effects = TestEffects::manual(1_700_000_000);
//! effects.clock.advance_secs(60);
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod effects;
pub mod fixtures;
pub mod time;

pub use effects::{PlainHasher, SequentialIds};
pub use fixtures::{collection, init_test_tracing, TestEffects};
pub use time::{ManualClock, TokioClock};
