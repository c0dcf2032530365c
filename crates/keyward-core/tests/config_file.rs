//! Configuration loading from disk

use keyward_core::{KeywardConfig, KeywardError};
use std::io::Write;

#[test]
fn load_reads_and_validates_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
log_filter = "keyward=debug"

[sessions]
ttl_secs = 3600
refresh_secs = 600
purge_interval_secs = 5
"#
    )
    .unwrap();

    let config = KeywardConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.log_filter, "keyward=debug");
    assert_eq!(config.sessions.ttl_secs, 3600);
    assert_eq!(config.sessions.purge_interval_secs, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn malformed_toml_is_invalid() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[sessions\nttl_secs = ").unwrap();

    let err = KeywardConfig::load_from_file(file.path()).unwrap_err();
    assert_matches::assert_matches!(err, KeywardError::Invalid { .. });
}

#[test]
fn missing_file_is_invalid() {
    let err = KeywardConfig::load_from_file(std::path::Path::new("/nonexistent/keyward.toml"))
        .unwrap_err();
    assert!(matches!(err, KeywardError::Invalid { .. }));
}
