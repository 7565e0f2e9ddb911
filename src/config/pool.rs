//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ConfigError, PoolOptions};

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrent handlers; 0 selects the built-in default.
    pub capacity: usize,
    /// Workers spawned at construction.
    pub prefill: usize,
    /// Reap workers idle longer than this many milliseconds; absent disables reaping.
    pub idle_timeout_ms: Option<u64>,
    /// Ready-queue buffer between the dispatcher and the workers.
    pub queue_capacity: usize,
    /// Overflow into an unbounded list instead of blocking the dispatcher.
    pub non_blocking: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: crate::core::DEFAULT_CAPACITY,
            prefill: 0,
            idle_timeout_ms: None,
            queue_capacity: 0,
            non_blocking: false,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a zero idle timeout or a pre-fill
    /// larger than the capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "idle_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.capacity != 0 && self.prefill > self.capacity {
            return Err(ConfigError::Invalid(format!(
                "prefill ({}) must not exceed capacity ({})",
                self.prefill, self.capacity
            )));
        }
        Ok(())
    }

    /// Parse pool configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON, or the validation error.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Idle timeout as a duration.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Translate into construction options (sinks and runtime left unset).
    #[must_use]
    pub fn to_options(&self) -> PoolOptions {
        let mut options = PoolOptions::new()
            .with_prefill(self.prefill)
            .with_queue_capacity(self.queue_capacity);
        if let Some(timeout) = self.idle_timeout() {
            options = options.with_idle_timeout(timeout);
        }
        if self.non_blocking {
            options = options.with_non_blocking();
        }
        options
    }
}
