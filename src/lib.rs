//! # Prometheus Async Core
//!
//! A bounded worker pool and a hashed time wheel for deferred, retriable work.
//!
//! The wheel decides *when* a unit of work runs; the pool decides *where* it
//! runs. Each is usable alone, and the usual deployment wires the wheel's
//! releases into the pool so that the pool's ceiling bounds everything the
//! wheel schedules.
//!
//! ## Key Features
//!
//! - **Concurrency ceiling**: at most `capacity` handlers run at once
//! - **Back-pressure or overflow**: the dispatcher either blocks or parks jobs in an unbounded list
//! - **Idle reaping and pre-fill**: workers are spawned on demand and retired when idle
//! - **Panic isolation**: a panicking handler is reported and the worker keeps serving
//! - **Retries**: failed wheel tasks are re-queued according to a [`DelayPolicy`](core::DelayPolicy)
//! - **Cancellation scopes**: every job carries a [`Context`](core::Context)
//!
//! ## WorkerPool
//!
//! ```rust,ignore
//! use prometheus_async_core::core::{Context, PoolOptions, WorkerPool};
//!
//! let pool = WorkerPool::new(8, PoolOptions::new().with_prefill(2).with_non_blocking())?;
//! pool.submit(Context::new(), |ctx| async move { index_document(ctx).await }).await;
//! println!("{:?}", pool.stats());
//! pool.close();
//! ```
//!
//! ## TimeWheel
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use prometheus_async_core::builders::{PoolBuilder, WheelBuilder};
//! use prometheus_async_core::core::{Context, DelayPolicy, TaskOptions};
//!
//! let pool = Arc::new(PoolBuilder::new(16).build()?);
//! let wheel = WheelBuilder::new(Duration::from_millis(100), 600).pool(pool).build()?;
//! wheel.run();
//! wheel.add_task(
//!     Context::new(),
//!     "webhook-42",
//!     |ctx| async move { deliver_webhook(ctx).await },
//!     TaskOptions::new()
//!         .with_max_attempts(5)
//!         .with_delay_policy(DelayPolicy::exponential(
//!             Duration::from_millis(200),
//!             Duration::from_secs(30),
//!         )),
//! );
//! ```
//!
//! For complete examples, see `tests/time_wheel_test.rs` and `tests/composition_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Worker pool, time wheel, scopes, handlers and errors.
pub mod core;
/// Configuration models for the pool and the wheel.
pub mod config;
/// Builders to construct pools and wheels from configuration.
pub mod builders;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::{build_core, AsyncCore, PoolBuilder, WheelBuilder};
pub use crate::config::{CoreConfig, PoolConfig, WheelConfig};
pub use crate::core::{
    AppResult, Context, DelayPolicy, PoolOptions, TaskHandler, TaskOptions, TimeWheel,
    WheelOptions, WorkerPool,
};
