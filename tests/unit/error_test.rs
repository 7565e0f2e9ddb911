//! Tests for error types

use prometheus_async_core::core::{BuildError, ConfigError, PoolError, WheelError};

#[test]
fn test_invalid_config_messages() {
    let err = PoolError::InvalidConfig("idle_timeout must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: idle_timeout must be greater than 0"
    );

    let err = WheelError::InvalidConfig("tick must be greater than 0".to_string());
    assert_eq!(format!("{err}"), "invalid configuration: tick must be greater than 0");
}

#[test]
fn test_env_error_names_key_and_value() {
    let err = ConfigError::Env {
        key: "CORE_WHEEL_SLOTS".to_string(),
        value: "lots".to_string(),
    };
    assert_eq!(format!("{err}"), "invalid value for CORE_WHEEL_SLOTS: \"lots\"");
}

#[test]
fn test_parse_error_from_serde() {
    let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err = ConfigError::from(source);
    assert!(format!("{err}").starts_with("parse error:"));
}

#[test]
fn test_build_error_is_transparent() {
    let err = BuildError::from(ConfigError::Invalid("slot_count must be greater than 0".into()));
    assert_eq!(format!("{err}"), "slot_count must be greater than 0");

    let err = BuildError::from(WheelError::InvalidConfig("tick must be greater than 0".into()));
    assert_eq!(format!("{err}"), "invalid configuration: tick must be greater than 0");
}

#[test]
fn test_no_runtime_error_outside_tokio() {
    let source = tokio::runtime::Handle::try_current().unwrap_err();
    let err = PoolError::from(source);
    assert!(format!("{err}").starts_with("no tokio runtime available"));
}
