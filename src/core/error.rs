//! Error types for pool, wheel and configuration operations.
//!
//! Only construction can fail synchronously. Once a pool or wheel is running,
//! failures are reported through `tracing` and the caller's sinks instead.

use thiserror::Error;
use tokio::runtime::TryCurrentError;

/// Errors produced while constructing a [`WorkerPool`](crate::core::WorkerPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No runtime handle was supplied and none is current.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Errors produced while constructing a [`TimeWheel`](crate::core::TimeWheel).
#[derive(Debug, Error)]
pub enum WheelError {
    /// Tick or slot count is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No runtime handle was supplied and none is current.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {key}: {value:?}")]
    Env {
        /// Variable name.
        key: String,
        /// Raw value found.
        value: String,
    },
    /// A field is out of range.
    #[error("{0}")]
    Invalid(String),
}

/// Errors produced by the builders, wrapping whichever stage failed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The pool could not be constructed.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// The wheel could not be constructed.
    #[error(transparent)]
    Wheel(#[from] WheelError),
}

/// Result type returned by task handlers.
pub type AppResult<T> = Result<T, anyhow::Error>;
