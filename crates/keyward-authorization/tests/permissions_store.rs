//! Resource ACL store and permission checks

mod support;

use keyward_authorization::{resource_key, Action, Pair};

#[test]
fn grant_is_visible_immediately() {
    let (groups, permissions) = support::stores();
    groups.add_groups("user_0", ["g"]).unwrap();

    permissions.set_permissions("posts", "g", Action::READ).unwrap();
    assert!(permissions.can("user_0", "posts", Action::READ));
    assert!(!permissions.can("user_0", "posts", Action::WRITE));
    assert!(!permissions.can("user_1", "posts", Action::READ));
}

#[test]
fn unset_revokes_every_action() {
    let (groups, permissions) = support::stores();
    groups.add_groups("user_0", ["g"]).unwrap();
    permissions.set_permissions("posts", "g", Action::ADMIN).unwrap();

    permissions.unset_permissions("posts", "g").unwrap();
    for action in [Action::READ, Action::WRITE, Action::DELETE] {
        assert!(!permissions.can("user_0", "posts", action));
    }
    assert!(!permissions.has("posts", "g"));
}

#[test]
fn broader_grant_keeps_earlier_bits() {
    let (groups, permissions) = support::stores();
    groups.add_groups("member", ["writers"]).unwrap();

    permissions.set_permissions("posts", "writers", Action::WRITE).unwrap();
    let resource = permissions
        .set_permissions("posts", "writers", Action::DELETE)
        .unwrap();

    assert_eq!(resource.actions("writers"), Some(Action::WRITE | Action::DELETE));
    assert!(permissions.can("member", "posts", Action::WRITE));
    assert!(permissions.can("member", "posts", Action::DELETE));
}

#[test]
fn redundant_grant_does_not_write() {
    let (_, permissions) = support::stores();
    let first = permissions.set_permissions("posts", "g", Action::ADMIN).unwrap();
    let second = permissions.set_permissions("posts", "g", Action::READ).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unset_on_missing_resource_is_noop() {
    let (_, permissions) = support::stores();
    permissions.unset_permissions("posts", "g").unwrap();
    assert!(permissions.get_by_key("posts").unwrap_err().is_not_found());
}

#[test]
fn compound_checks_are_denied() {
    let (groups, permissions) = support::stores();
    groups.add_groups("user_0", ["g"]).unwrap();
    permissions.set_permissions("posts", "g", Action::ADMIN).unwrap();

    assert!(!permissions.can("user_0", "posts", Action::READ_WRITE));
    assert!(!permissions.can("user_0", "posts", Action::NONE));
}

#[test]
fn multi_set_and_unset_apply_together() {
    let (groups, permissions) = support::stores();
    groups.add_groups("user_0", ["readers"]).unwrap();
    groups.add_groups("user_1", ["editors"]).unwrap();
    let key = resource_key("posts", "42");

    permissions
        .set_multi_permissions(
            &key,
            &[
                Pair::new("readers", Action::READ),
                Pair::new("editors", Action::READ_WRITE),
            ],
        )
        .unwrap();
    assert!(permissions.can("user_0", &key, Action::READ));
    assert!(permissions.can("user_1", &key, Action::WRITE));

    permissions
        .unset_multi_permissions(&key, &["readers", "editors"])
        .unwrap();
    let resource = permissions.get_by_key(&key).unwrap();
    assert!(resource.groups.is_empty());
    assert!(!permissions.can("user_1", &key, Action::READ));
}

#[test]
fn remove_resource_drops_the_acl() {
    let (groups, permissions) = support::stores();
    groups.add_groups("user_0", ["g"]).unwrap();
    let resource = permissions.set_permissions("posts", "g", Action::READ).unwrap();
    assert_eq!(permissions.get(&resource.meta.id).unwrap().key, "posts");

    permissions.remove_resource("posts").unwrap();
    assert!(!permissions.can("user_0", "posts", Action::READ));
    assert!(permissions.remove_resource("posts").unwrap_err().is_not_found());
}

#[test]
fn can_fails_closed_when_store_is_closed() {
    let (groups, permissions) = support::stores();
    groups.add_groups("user_0", ["g"]).unwrap();
    permissions.set_permissions("posts", "g", Action::READ).unwrap();

    groups.close().unwrap();
    assert!(!permissions.can("user_0", "posts", Action::READ));
}

#[test]
fn empty_inputs_are_rejected_before_writing() {
    let (_, permissions) = support::stores();
    let err = permissions.set_permissions("", "", Action::READ).unwrap_err();
    assert!(err.is_validation());
    assert!(permissions.get_by_key("").unwrap_err().is_not_found());
}

#[test]
fn concurrent_grants_union_on_one_resource() {
    let (_, permissions) = support::stores();
    let grants = [Action::READ, Action::WRITE, Action::DELETE];

    std::thread::scope(|scope| {
        for n in 0..12 {
            let permissions = &permissions;
            let action = grants[n % grants.len()];
            scope.spawn(move || {
                permissions.set_permissions("posts", "g", action).unwrap();
                permissions
                    .set_permissions("posts", &format!("g{n}"), action)
                    .unwrap();
            });
        }
    });

    let resource = permissions.get_by_key("posts").unwrap();
    assert_eq!(resource.actions("g"), Some(Action::ADMIN));
    assert_eq!(resource.groups.len(), 13);
}
