//! Tests for configuration validation

use prometheus_async_core::config::{CoreConfig, PoolConfig, WheelConfig};
use prometheus_async_core::core::{ConfigError, DEFAULT_CAPACITY};

#[test]
fn test_pool_config_validation() {
    let valid = PoolConfig {
        capacity: 8,
        prefill: 2,
        idle_timeout_ms: Some(1000),
        queue_capacity: 4,
        non_blocking: false,
    };
    assert!(valid.validate().is_ok());
}

#[test]
fn test_pool_config_zero_idle_timeout() {
    let invalid = PoolConfig {
        idle_timeout_ms: Some(0),
        ..PoolConfig::default()
    };
    assert!(matches!(invalid.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_pool_config_zero_capacity_allowed() {
    let cfg = PoolConfig {
        capacity: 0,
        prefill: 50,
        ..PoolConfig::default()
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_wheel_config_validation() {
    assert!(WheelConfig::default().validate().is_ok());
    let invalid = WheelConfig {
        tick_ms: 0,
        slot_count: 10,
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_core_config_from_json() {
    let json = r#"
    {
        "pool": { "capacity": 16, "prefill": 4, "non_blocking": true },
        "wheel": { "tick_ms": 250, "slot_count": 240 }
    }
    "#;
    let cfg = CoreConfig::from_json_str(json).unwrap();
    let pool = cfg.pool.unwrap();
    assert_eq!(pool.capacity, 16);
    assert_eq!(pool.prefill, 4);
    assert!(pool.non_blocking);
    assert_eq!(cfg.wheel.tick_ms, 250);
    assert_eq!(cfg.wheel.slot_count, 240);
}

#[test]
fn test_core_config_defaults_from_empty_json() {
    let cfg = CoreConfig::from_json_str("{}").unwrap();
    assert!(cfg.pool.is_none());
    assert_eq!(cfg.wheel, WheelConfig::default());
}

#[test]
fn test_core_config_reports_section() {
    let err = CoreConfig::from_json_str(r#"{ "wheel": { "slot_count": 0 } }"#).unwrap_err();
    assert!(format!("{err}").starts_with("wheel invalid:"));

    let err = CoreConfig::from_json_str(r#"{ "pool": { "idle_timeout_ms": 0 } }"#).unwrap_err();
    assert!(format!("{err}").starts_with("pool invalid:"));
}

#[test]
fn test_core_config_parse_error() {
    let err = CoreConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_core_config_from_lookup() {
    let cfg = CoreConfig::from_lookup(|key| match key {
        "CORE_WHEEL_TICK_MS" => Some("20".to_string()),
        "CORE_POOL_PREFILL" => Some("2".to_string()),
        "CORE_POOL_IDLE_TIMEOUT_MS" => Some("5000".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(cfg.wheel.tick_ms, 20);
    let pool = cfg.pool.unwrap();
    assert_eq!(pool.capacity, DEFAULT_CAPACITY);
    assert_eq!(pool.prefill, 2);
    assert_eq!(pool.idle_timeout_ms, Some(5000));
}

#[test]
fn test_core_config_roundtrips_through_serde() {
    let cfg = CoreConfig {
        pool: Some(PoolConfig::default()),
        wheel: WheelConfig::default(),
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(CoreConfig::from_json_str(&json).unwrap(), cfg);
}
