//! Tests for builder modules

use std::time::Duration;

use prometheus_async_core::builders::{PoolBuilder, WheelBuilder};
use prometheus_async_core::config::{PoolConfig, WheelConfig};
use prometheus_async_core::core::{BuildError, WheelState};

#[test]
fn test_pool_builder_rejects_invalid_config() {
    let cfg = PoolConfig {
        idle_timeout_ms: Some(0),
        ..PoolConfig::default()
    };
    assert!(matches!(
        PoolBuilder::from_config(&cfg),
        Err(BuildError::Config(_))
    ));
}

#[test]
fn test_pool_builder_needs_runtime() {
    assert!(matches!(PoolBuilder::new(2).build(), Err(BuildError::Pool(_))));
}

#[test]
fn test_wheel_builder_rejects_zero_tick() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let result = WheelBuilder::new(Duration::ZERO, 4)
        .handle(runtime.handle().clone())
        .build();
    assert!(matches!(result, Err(BuildError::Wheel(_))));
}

#[test]
fn test_builders_accept_explicit_handle() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .unwrap();

    let pool = PoolBuilder::new(4)
        .prefill(2)
        .handle(runtime.handle().clone())
        .build()
        .unwrap();
    assert_eq!(pool.stats().workers, 2);

    let wheel = WheelBuilder::from(&WheelConfig {
        tick_ms: 5,
        slot_count: 12,
    })
    .handle(runtime.handle().clone())
    .build()
    .unwrap();
    assert_eq!(wheel.tick(), Duration::from_millis(5));
    assert_eq!(wheel.slot_count(), 12);
    assert_eq!(wheel.state(), WheelState::Constructed);

    wheel.stop();
    pool.close();
}

#[tokio::test]
async fn test_pool_builder_from_config() {
    let cfg = PoolConfig {
        capacity: 6,
        prefill: 3,
        idle_timeout_ms: Some(10_000),
        queue_capacity: 2,
        non_blocking: true,
    };
    let pool = PoolBuilder::from_config(&cfg).unwrap().build().unwrap();
    let stats = pool.stats();
    assert_eq!(stats.capacity, 6);
    assert_eq!(stats.workers, 3);
}

#[tokio::test]
async fn test_wheel_builder_default_matches_config_default() {
    let wheel = WheelBuilder::default().build().unwrap();
    let cfg = WheelConfig::default();
    assert_eq!(wheel.tick(), cfg.tick());
    assert_eq!(wheel.slot_count(), cfg.slot_count);
}
