//! Builders to construct pools and wheels from configuration.

pub mod core_builder;
pub mod pool_builder;
pub mod wheel_builder;

pub use core_builder::{build_core, AsyncCore, CoreSinks};
pub use pool_builder::PoolBuilder;
pub use wheel_builder::WheelBuilder;
