//! Configuration models for the pool and the wheel.

pub mod core_config;
pub mod pool;
pub mod wheel;

pub use core_config::CoreConfig;
pub use pool::PoolConfig;
pub use wheel::WheelConfig;
