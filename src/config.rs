use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming a JSON file to load the configuration from.
pub const CONFIG_PATH_ENV: &str = "TRAFFIC_CONFIG";

/// Upper bound on every configured duration (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Timing configuration for the intersection. All durations are whole seconds.
///
/// Unknown keys are rejected when loading from JSON; missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalConfig {
    /// Green time for a lane with light traffic (1-3 vehicles).
    pub base_green_secs: u64,
    pub yellow_secs: u64,
    pub min_green_secs: u64,
    pub max_green_secs: u64,
    /// Override length used when an emergency report does not carry one.
    pub default_emergency_override_secs: u64,
    /// Upper bound on any emergency override; longer requests are clamped.
    pub max_emergency_override_secs: u64,
    pub tick_period_secs: u64,
    /// Vehicle count at which a waiting lane may cut short a crossing green.
    pub high_traffic_threshold: u32,
    /// Pause after a failed tick before the loop resumes.
    pub error_backoff_secs: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            base_green_secs: 30,
            yellow_secs: 3,
            min_green_secs: 10,
            max_green_secs: 120,
            default_emergency_override_secs: 60,
            max_emergency_override_secs: 120,
            tick_period_secs: 1,
            high_traffic_threshold: 5,
            error_backoff_secs: 5,
        }
    }
}

impl SignalConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ControlError> {
        let config: SignalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Loads from the file named by `TRAFFIC_CONFIG`, or the defaults when unset.
    pub fn load() -> Result<Self, ControlError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                log::info!("Loading signal configuration from {}", path);
                Self::from_json_file(path)
            }
            Err(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        let durations = [
            ("base_green_secs", self.base_green_secs),
            ("yellow_secs", self.yellow_secs),
            ("min_green_secs", self.min_green_secs),
            ("max_green_secs", self.max_green_secs),
            ("default_emergency_override_secs", self.default_emergency_override_secs),
            ("max_emergency_override_secs", self.max_emergency_override_secs),
            ("tick_period_secs", self.tick_period_secs),
            ("error_backoff_secs", self.error_backoff_secs),
        ];
        if let Some((name, value)) = durations.iter().find(|(_, v)| *v > MAX_DURATION_SECS) {
            return Err(ControlError::invalid_config(format!(
                "{} ({}) exceeds {}s",
                name, value, MAX_DURATION_SECS
            )));
        }
        if self.tick_period_secs == 0 {
            return Err(ControlError::invalid_config("tick_period_secs must be > 0"));
        }
        if self.yellow_secs == 0 {
            return Err(ControlError::invalid_config("yellow_secs must be > 0"));
        }
        if self.min_green_secs == 0 {
            return Err(ControlError::invalid_config("min_green_secs must be > 0"));
        }
        if self.min_green_secs > self.base_green_secs {
            return Err(ControlError::invalid_config(format!(
                "min_green_secs ({}) exceeds base_green_secs ({})",
                self.min_green_secs, self.base_green_secs
            )));
        }
        if self.base_green_secs > self.max_green_secs {
            return Err(ControlError::invalid_config(format!(
                "base_green_secs ({}) exceeds max_green_secs ({})",
                self.base_green_secs, self.max_green_secs
            )));
        }
        if self.default_emergency_override_secs == 0 {
            return Err(ControlError::invalid_config(
                "default_emergency_override_secs must be > 0",
            ));
        }
        if self.default_emergency_override_secs > self.max_emergency_override_secs {
            return Err(ControlError::invalid_config(format!(
                "default_emergency_override_secs ({}) exceeds max_emergency_override_secs ({})",
                self.default_emergency_override_secs, self.max_emergency_override_secs
            )));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_period_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}
