//! Worker pool, time wheel, and the scope and handler types they share.

pub mod context;
pub mod delay;
pub mod error;
pub mod handler;
pub mod time_wheel;
pub mod worker_pool;

pub use context::{task_added_at, Context, TASK_ADDED_AT};
pub use delay::DelayPolicy;
pub use error::{AppResult, BuildError, ConfigError, PoolError, WheelError};
pub use handler::TaskHandler;
pub use time_wheel::{TaskOptions, TimeWheel, WheelOptions, WheelState};
pub use worker_pool::{PoolOptions, PoolStats, WorkerPool, DEFAULT_CAPACITY};
