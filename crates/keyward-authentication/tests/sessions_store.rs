//! Session lifecycle and the purge loop

mod support;

use assert_matches::assert_matches;
use keyward_core::config::SessionConfig;
use keyward_core::KeywardError;
use keyward_testkit::{ManualClock, TokioClock};
use std::time::Duration;

fn short_lived() -> SessionConfig {
    SessionConfig {
        ttl_secs: 100,
        refresh_secs: 10,
        purge_interval_secs: 5,
    }
}

#[test]
fn session_is_found_only_with_both_halves() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), SessionConfig::default());

    let pair = sessions.new_session("user_0").unwrap();
    let session = sessions.get(&pair.key, &pair.token).unwrap();
    assert_eq!(session.user_id, "user_0");

    let altered_key = format!("{}x", pair.key);
    let altered_token = format!("{}x", pair.token);
    assert!(sessions.get(&altered_key, &pair.token).unwrap_err().is_not_found());
    assert!(sessions.get(&pair.key, &altered_token).unwrap_err().is_not_found());
    assert!(sessions.get(&pair.token, &pair.key).unwrap_err().is_not_found());
}

#[test]
fn logout_removes_the_session() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), SessionConfig::default());
    let pair = sessions.new_session("user_0").unwrap();

    sessions.remove(&pair.key, &pair.token).unwrap();
    assert!(sessions.get(&pair.key, &pair.token).unwrap_err().is_not_found());
    assert!(sessions.remove(&pair.key, &pair.token).unwrap_err().is_not_found());
}

#[test]
fn invalidate_user_only_touches_that_user() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), SessionConfig::default());
    sessions.new_session("user_0").unwrap();
    sessions.new_session("user_0").unwrap();
    let other = sessions.new_session("user_1").unwrap();

    assert_eq!(sessions.invalidate_user("user_0").unwrap(), 2);
    assert!(sessions.get_by_user("user_0").unwrap().is_empty());
    assert!(sessions.get(&other.key, &other.token).is_ok());
}

#[test]
fn get_by_user_lists_most_recent_first() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), short_lived());
    let older = sessions.new_session("user_0").unwrap();
    clock.advance_secs(5);
    sessions.new_session("user_0").unwrap();
    clock.advance_secs(20);
    sessions.refresh(&older.key, &older.token).unwrap();

    let listed = sessions.get_by_user("user_0").unwrap();
    let used: Vec<_> = listed.iter().map(|s| s.last_used_at).collect();
    assert_eq!(used, vec![1_025, 1_005]);
}

#[test]
fn purge_removes_only_idle_sessions() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), short_lived());
    let stale = sessions.new_session("user_0").unwrap();
    clock.advance_secs(50);
    let fresh = sessions.new_session("user_1").unwrap();

    assert_eq!(sessions.purge(1_010).unwrap(), 1);
    assert!(sessions.get(&stale.key, &stale.token).unwrap_err().is_not_found());
    assert!(sessions.get(&fresh.key, &fresh.token).is_ok());
}

#[test]
fn expired_session_is_readable_until_purged() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), short_lived());
    let pair = sessions.new_session("user_0").unwrap();

    clock.advance_secs(500);
    assert!(sessions.get(&pair.key, &pair.token).is_ok());
}

#[tokio::test]
async fn failed_new_leaves_nothing_behind() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), SessionConfig::default());
    sessions.close().await.unwrap();

    assert_matches!(
        sessions.new_session("user_0"),
        Err(KeywardError::Storage { .. })
    );
}

#[tokio::test(start_paused = true)]
async fn purge_loop_reaps_idle_sessions() {
    let clock = TokioClock::new(1_700_000_000);
    let sessions = support::sessions(clock.shared(), short_lived());
    sessions.spawn_purge_loop().unwrap();

    let stale = sessions.new_session("user_0").unwrap();
    tokio::time::sleep(Duration::from_secs(80)).await;
    let fresh = sessions.new_session("user_1").unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(sessions.get(&stale.key, &stale.token).unwrap_err().is_not_found());
    assert!(sessions.get(&fresh.key, &fresh.token).is_ok());

    sessions.close().await.unwrap();
    assert!(!sessions.is_purging());
}

#[tokio::test]
async fn purge_loop_starts_once() {
    let clock = ManualClock::new(1_000);
    let sessions = support::sessions(clock.shared(), short_lived());
    sessions.spawn_purge_loop().unwrap();
    assert!(sessions.is_purging());
    assert!(sessions.spawn_purge_loop().unwrap_err().is_conflict());
    sessions.close().await.unwrap();
}
