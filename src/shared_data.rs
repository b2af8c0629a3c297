// src/shared_data.rs

use crate::config::SignalConfig;
use crate::control_system::emergency::{EmergencyAlert, EmergencyType};
use crate::control_system::signal::Direction;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in milliseconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-lane counts published by the vehicle detector. Replaces the previous counts
/// wholesale; lanes left out are treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCountUpdate {
    pub lane_counts: HashMap<String, u32>,
    #[serde(default)]
    pub timestamp: u64,
}

impl VehicleCountUpdate {
    /// Parses the lane keys. A single unknown lane rejects the whole update.
    pub fn counts(&self) -> Result<HashMap<Direction, u32>, ControlError> {
        self.lane_counts
            .iter()
            .map(|(lane, count)| Ok((lane.parse::<Direction>()?, *count)))
            .collect()
    }
}

/// Emergency vehicle report as it arrives from the reporting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyReport {
    pub alert_id: String,
    pub emergency_type: EmergencyType,
    pub detected_lane: String,
    #[serde(default = "default_priority")]
    pub priority_level: u8,
    /// Seconds; the configured default is used when absent.
    #[serde(default)]
    pub override_duration_secs: Option<i64>,
}

fn default_priority() -> u8 {
    1
}

impl EmergencyReport {
    pub fn into_alert(self, config: &SignalConfig) -> Result<EmergencyAlert, ControlError> {
        let lane: Direction = self.detected_lane.parse()?;
        let duration = self
            .override_duration_secs
            .unwrap_or(config.default_emergency_override_secs as i64);
        EmergencyAlert::new(self.alert_id, lane, duration, config)?
            .with_type(self.emergency_type)
            .with_priority(self.priority_level)
    }
}
