//! Builder for [`TimeWheel`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::WheelConfig;
use crate::core::{BuildError, Context, TimeWheel, WheelOptions, WorkerPool};

/// Fluent construction of a [`TimeWheel`], optionally seeded from a [`WheelConfig`].
#[derive(Debug, Clone)]
pub struct WheelBuilder {
    tick: Duration,
    slot_count: usize,
    options: WheelOptions,
}

impl Default for WheelBuilder {
    fn default() -> Self {
        Self::from(&WheelConfig::default())
    }
}

impl From<&WheelConfig> for WheelBuilder {
    fn from(cfg: &WheelConfig) -> Self {
        Self::new(cfg.tick(), cfg.slot_count)
    }
}

impl WheelBuilder {
    /// Start from `tick` and `slot_count` with default options.
    #[must_use]
    pub fn new(tick: Duration, slot_count: usize) -> Self {
        Self {
            tick,
            slot_count,
            options: WheelOptions::new(),
        }
    }

    /// Release tasks through `pool`.
    #[must_use]
    pub fn pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.options = self.options.with_pool(pool);
        self
    }

    /// See [`WheelOptions::with_panic_sink`].
    #[must_use]
    pub fn panic_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &(dyn Any + Send), &Backtrace) + Send + Sync + 'static,
    {
        self.options = self.options.with_panic_sink(sink);
        self
    }

    /// See [`WheelOptions::with_log_sink`].
    #[must_use]
    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &str) + Send + Sync + 'static,
    {
        self.options = self.options.with_log_sink(sink);
        self
    }

    /// See [`WheelOptions::with_handle`].
    #[must_use]
    pub fn handle(mut self, handle: Handle) -> Self {
        self.options = self.options.with_handle(handle);
        self
    }

    pub(crate) fn options_mut(&mut self) -> &mut WheelOptions {
        &mut self.options
    }

    /// Construct the wheel without starting it.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Wheel` for a zero tick or slot count, or without a runtime.
    pub fn build(self) -> Result<TimeWheel, BuildError> {
        Ok(TimeWheel::new(self.tick, self.slot_count, self.options)?)
    }
}
