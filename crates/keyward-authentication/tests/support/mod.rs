//! Shared setup for authentication integration tests

#![allow(dead_code)]

use keyward_authentication::{EventBus, Sessions, SsoCodes, Users};
use keyward_core::config::{SessionConfig, SsoConfig};
use keyward_core::{Clock, IdGenerator};
use keyward_testkit::{collection, PlainHasher, SequentialIds};
use std::sync::Arc;

pub fn ids() -> Arc<dyn IdGenerator> {
    SequentialIds::shared("id")
}

pub fn sessions(clock: Arc<dyn Clock>, config: SessionConfig) -> Sessions {
    keyward_testkit::init_test_tracing();
    let ids = ids();
    Sessions::new(collection("sessions", ids.clone(), clock.clone()), ids, clock, config)
}

pub fn sso(clock: Arc<dyn Clock>, config: SsoConfig) -> SsoCodes {
    keyward_testkit::init_test_tracing();
    let ids = ids();
    SsoCodes::new(collection("sso", ids.clone(), clock.clone()), ids, clock, config)
}

pub fn users(clock: Arc<dyn Clock>) -> Users {
    keyward_testkit::init_test_tracing();
    Users::new(
        collection("users", ids(), clock.clone()),
        PlainHasher::shared(),
        clock,
        EventBus::default(),
    )
}
