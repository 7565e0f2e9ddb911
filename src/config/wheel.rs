//! Time wheel configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

/// Wheel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    /// Tick length in milliseconds.
    pub tick_ms: u64,
    /// Number of slots.
    pub slot_count: usize,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            slot_count: 60,
        }
    }
}

impl WheelConfig {
    /// Validate wheel configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the tick or slot count is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be greater than 0".into()));
        }
        if self.slot_count == 0 {
            return Err(ConfigError::Invalid(
                "slot_count must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse wheel configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON, or the validation error.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Tick as a duration.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one_minute_of_seconds() {
        let cfg = WheelConfig::default();
        assert_eq!(cfg.tick(), Duration::from_secs(1));
        assert_eq!(cfg.slot_count, 60);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(WheelConfig::from_json_str(r#"{ "tick_ms": 0 }"#).is_err());
        assert!(WheelConfig::from_json_str(r#"{ "slot_count": 0 }"#).is_err());
    }
}
