//! Combined configuration for a wheel with an optional pool.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{PoolConfig, WheelConfig};
use crate::core::ConfigError;

/// Wheel tick in milliseconds.
pub const ENV_WHEEL_TICK_MS: &str = "CORE_WHEEL_TICK_MS";
/// Wheel slot count.
pub const ENV_WHEEL_SLOTS: &str = "CORE_WHEEL_SLOTS";
/// Pool capacity; setting any `CORE_POOL_*` variable enables the pool.
pub const ENV_POOL_CAPACITY: &str = "CORE_POOL_CAPACITY";
/// Pool pre-fill.
pub const ENV_POOL_PREFILL: &str = "CORE_POOL_PREFILL";
/// Pool idle timeout in milliseconds.
pub const ENV_POOL_IDLE_TIMEOUT_MS: &str = "CORE_POOL_IDLE_TIMEOUT_MS";
/// Pool ready-queue capacity.
pub const ENV_POOL_QUEUE_CAPACITY: &str = "CORE_POOL_QUEUE_CAPACITY";
/// Pool non-blocking flag (`true`/`false`).
pub const ENV_POOL_NON_BLOCKING: &str = "CORE_POOL_NON_BLOCKING";

const POOL_KEYS: [&str; 5] = [
    ENV_POOL_CAPACITY,
    ENV_POOL_PREFILL,
    ENV_POOL_IDLE_TIMEOUT_MS,
    ENV_POOL_QUEUE_CAPACITY,
    ENV_POOL_NON_BLOCKING,
];

/// Root configuration: the wheel, and the pool it releases into if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Pool settings; `None` runs released tasks inline.
    pub pool: Option<PoolConfig>,
    /// Wheel settings.
    pub wheel: WheelConfig,
}

impl CoreConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first section error, prefixed with the section name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wheel
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("wheel invalid: {e}")))?;
        if let Some(pool) = &self.pool {
            pool.validate()
                .map_err(|e| ConfigError::Invalid(format!("pool invalid: {e}")))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON, or the validation error.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the process environment, reading a `.env` file first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Env` for a value that does not parse, or the
    /// validation error.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(tick_ms) = parse(&lookup, ENV_WHEEL_TICK_MS)? {
            cfg.wheel.tick_ms = tick_ms;
        }
        if let Some(slots) = parse(&lookup, ENV_WHEEL_SLOTS)? {
            cfg.wheel.slot_count = slots;
        }

        if POOL_KEYS.iter().any(|key| lookup(key).is_some()) {
            let mut pool = PoolConfig::default();
            if let Some(capacity) = parse(&lookup, ENV_POOL_CAPACITY)? {
                pool.capacity = capacity;
            }
            if let Some(prefill) = parse(&lookup, ENV_POOL_PREFILL)? {
                pool.prefill = prefill;
            }
            pool.idle_timeout_ms = parse(&lookup, ENV_POOL_IDLE_TIMEOUT_MS)?;
            if let Some(queue_capacity) = parse(&lookup, ENV_POOL_QUEUE_CAPACITY)? {
                pool.queue_capacity = queue_capacity;
            }
            if let Some(non_blocking) = parse(&lookup, ENV_POOL_NON_BLOCKING)? {
                pool.non_blocking = non_blocking;
            }
            cfg.pool = Some(pool);
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::Env {
                key: key.to_string(),
                value: raw.clone(),
            })
        })
        .transpose()
}
