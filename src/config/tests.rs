//! Tests for config functionality.

use crate::config::Config;
use crate::exit_codes;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.runtime_dir, None);
    assert_eq!(config.poll_interval_ms, 100);
    assert_eq!(config.max_poll_interval_ms, 1000);
    assert_eq!(config.gate_timeout_ms, 2000);
    assert_eq!(config.busy_exit_code, exit_codes::ALREADY_RUNNING);
    assert_eq!(config.lock_failure_exit_code, exit_codes::LOCK_FAILURE);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
poll_interval_ms: 50
runtime_dir: /var/run/singlerun
"#;
    let config = Config::from_yaml(yaml).unwrap();

    // Specified values should be used
    assert_eq!(config.poll_interval_ms, 50);
    assert_eq!(config.runtime_dir, Some(PathBuf::from("/var/run/singlerun")));

    // Unspecified values should use defaults
    assert_eq!(config.max_poll_interval_ms, 1000);
    assert_eq!(config.busy_exit_code, exit_codes::ALREADY_RUNNING);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
runtime_dir: /tmp/locks
poll_interval_ms: 10
max_poll_interval_ms: 40
gate_timeout_ms: 500
busy_exit_code: 99
lock_failure_exit_code: 98
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.runtime_dir, Some(PathBuf::from("/tmp/locks")));
    assert_eq!(config.poll_interval_ms, 10);
    assert_eq!(config.max_poll_interval_ms, 40);
    assert_eq!(config.gate_timeout_ms, 500);
    assert_eq!(config.busy_exit_code, 99);
    assert_eq!(config.lock_failure_exit_code, 98);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
poll_interval_ms: 20
some_future_option: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.poll_interval_ms, 20);
}

#[test]
fn test_invalid_yaml_is_user_error() {
    let result = Config::from_yaml("poll_interval_ms: [not, a, number]");
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("failed to parse config YAML")
    );
}

#[test]
fn test_zero_interval_rejected() {
    let result = Config::from_yaml("poll_interval_ms: 0");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("poll_interval_ms"));

    let result = Config::from_yaml("gate_timeout_ms: 0");
    assert!(result.unwrap_err().to_string().contains("gate_timeout_ms"));
}

#[test]
fn test_max_interval_below_initial_rejected() {
    let yaml = r#"
poll_interval_ms: 500
max_poll_interval_ms: 100
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("max_poll_interval_ms"));
}

#[test]
fn test_reserved_exit_codes_validated() {
    assert!(Config::from_yaml("busy_exit_code: 0").is_err());
    assert!(Config::from_yaml("busy_exit_code: 1").is_err());
    assert!(Config::from_yaml("busy_exit_code: 127").is_err());
    assert!(Config::from_yaml("lock_failure_exit_code: 200").is_err());

    let yaml = r#"
busy_exit_code: 80
lock_failure_exit_code: 80
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("must differ"));
}

#[test]
fn test_usage_error_code_cannot_be_reserved() {
    let err = Config::from_yaml("busy_exit_code: 64").unwrap_err();
    assert!(err.to_string().contains("busy_exit_code must not be 64"));

    let err = Config::from_yaml("lock_failure_exit_code: 64").unwrap_err();
    assert!(err.to_string().contains("lock_failure_exit_code must not be 64"));

    // Neighbouring sysexits codes stay available
    let config = Config::from_yaml("busy_exit_code: 65\nlock_failure_exit_code: 70").unwrap();
    assert_eq!(config.busy_exit_code, 65);
}

#[test]
fn test_store_options_from_config() {
    let config = Config::from_yaml("poll_interval_ms: 25\nmax_poll_interval_ms: 75").unwrap();
    let options = config.store_options();

    assert_eq!(options.poll_interval, Duration::from_millis(25));
    assert_eq!(options.max_poll_interval, Duration::from_millis(75));
    assert_eq!(options.gate_timeout, Duration::from_millis(2000));
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "busy_exit_code: 90\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.busy_exit_code, 90);
}

#[test]
fn test_load_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let err = Config::load(temp_dir.path().join("missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_load_or_default_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_or_default(temp_dir.path().join("missing.yaml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_reports_path_on_invalid_value() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "poll_interval_ms: 0\n").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("config.yaml"));
}
