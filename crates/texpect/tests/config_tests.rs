//! Integration tests for configuration loading.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;
use texpect::{Config, EnvConfig, LogFormat};

#[test]
fn load_file_then_apply_environment() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[watch]
rescan_interval_ms = 200

[timeouts]
expect_secs = 30

[sessions]
log_dir = "/var/log/texpect"

[logging]
format = "pretty"
"#
    )
    .unwrap();

    let env = EnvConfig::from_vars(
        "TEXPECT",
        [
            ("TEXPECT_EXPECT_TIMEOUT", "5"),
            ("TEXPECT_LOG_FORMAT", "json"),
            ("HOME", "/root"),
        ],
    );
    let config = Config::load(file.path()).unwrap().with_env(&env).unwrap();

    assert_eq!(config.watch.rescan_interval, Some(Duration::from_millis(200)));
    assert_eq!(config.timeouts.expect, Some(Duration::from_secs(5)));
    assert_eq!(config.sessions.log_dir, PathBuf::from("/var/log/texpect"));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn invalid_file_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[timeouts]\nexpect_secs = \"soon\"").unwrap();

    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("configuration error"));
    assert_eq!(err.to_string().matches("configuration error").count(), 1);
}

#[test]
fn defaults_wait_without_limit() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.timeouts.expect, None);
    assert!(config.watch.rescan_interval.is_some());
}
