//! Shared setup for authorization integration tests

#![allow(dead_code)]

use keyward_authorization::{Groups, Permissions};
use keyward_testkit::TestEffects;

pub fn stores() -> (Groups, Permissions) {
    keyward_testkit::init_test_tracing();
    let effects = TestEffects::manual(1_700_000_000);
    let groups = Groups::new(effects.collection("groups"));
    let permissions = Permissions::new(effects.collection("resources"), groups.clone());
    (groups, permissions)
}
