//! Builder for [`WorkerPool`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::PoolConfig;
use crate::core::{BuildError, Context, PoolOptions, WorkerPool};

/// Fluent construction of a [`WorkerPool`], optionally seeded from a [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    capacity: usize,
    options: PoolOptions,
}

impl PoolBuilder {
    /// Start from `capacity` with default options.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            options: PoolOptions::new(),
        }
    }

    /// Start from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Config` when `cfg` does not validate.
    pub fn from_config(cfg: &PoolConfig) -> Result<Self, BuildError> {
        cfg.validate()?;
        Ok(Self {
            capacity: cfg.capacity,
            options: cfg.to_options(),
        })
    }

    /// See [`PoolOptions::with_prefill`].
    #[must_use]
    pub fn prefill(mut self, prefill: usize) -> Self {
        self.options = self.options.with_prefill(prefill);
        self
    }

    /// See [`PoolOptions::with_idle_timeout`].
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_idle_timeout(timeout);
        self
    }

    /// See [`PoolOptions::with_queue_capacity`].
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options = self.options.with_queue_capacity(capacity);
        self
    }

    /// See [`PoolOptions::with_non_blocking`].
    #[must_use]
    pub fn non_blocking(mut self) -> Self {
        self.options = self.options.with_non_blocking();
        self
    }

    /// See [`PoolOptions::with_panic_sink`].
    #[must_use]
    pub fn panic_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &(dyn Any + Send), &Backtrace) + Send + Sync + 'static,
    {
        self.options = self.options.with_panic_sink(sink);
        self
    }

    /// See [`PoolOptions::with_log_sink`].
    #[must_use]
    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &str) + Send + Sync + 'static,
    {
        self.options = self.options.with_log_sink(sink);
        self
    }

    /// See [`PoolOptions::with_handle`].
    #[must_use]
    pub fn handle(mut self, handle: Handle) -> Self {
        self.options = self.options.with_handle(handle);
        self
    }

    pub(crate) fn options_mut(&mut self) -> &mut PoolOptions {
        &mut self.options
    }

    /// Construct the pool.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Pool` if the pool rejects its options.
    pub fn build(self) -> Result<WorkerPool, BuildError> {
        Ok(WorkerPool::new(self.capacity, self.options)?)
    }
}
