use crate::config::SignalConfig;
use crate::control_system::intersection_state::IntersectionState;
use crate::control_system::signal::{Direction, LightState};
use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyType {
    Ambulance,
    FireTruck,
    Police,
    Rescue,
}

/// A validated request to hold one lane green for an emergency vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAlert {
    pub alert_id: String,
    pub emergency_type: EmergencyType,
    pub detected_lane: Direction,
    /// 1 (lowest) to 5.
    pub priority_level: u8,
    /// Seconds the override holds, already clamped to the configured maximum.
    pub override_duration: u64,
    pub is_active: bool,
}

impl EmergencyAlert {
    /// Builds an ambulance alert with priority 1.
    ///
    /// Rejects an empty id and a zero or negative duration; clamps anything above
    /// `max_emergency_override_secs`.
    pub fn new(
        alert_id: impl Into<String>,
        detected_lane: Direction,
        override_duration_secs: i64,
        config: &SignalConfig,
    ) -> Result<Self, ControlError> {
        let alert_id = alert_id.into();
        if alert_id.trim().is_empty() {
            return Err(ControlError::invalid_alert("alert_id must not be empty"));
        }
        if override_duration_secs <= 0 {
            return Err(ControlError::invalid_alert(format!(
                "override duration must be positive, got {}",
                override_duration_secs
            )));
        }
        let override_duration =
            (override_duration_secs as u64).min(config.max_emergency_override_secs);

        Ok(Self {
            alert_id,
            emergency_type: EmergencyType::Ambulance,
            detected_lane,
            priority_level: 1,
            override_duration,
            is_active: false,
        })
    }

    pub fn with_type(mut self, emergency_type: EmergencyType) -> Self {
        self.emergency_type = emergency_type;
        self
    }

    pub fn with_priority(mut self, priority_level: u8) -> Result<Self, ControlError> {
        if !(1..=5).contains(&priority_level) {
            return Err(ControlError::invalid_alert(format!(
                "priority_level must be within 1..=5, got {}",
                priority_level
            )));
        }
        self.priority_level = priority_level;
        Ok(self)
    }
}

#[derive(Debug, Clone)]
struct ActiveOverride {
    alert: EmergencyAlert,
    seq: u64,
    expires_at: Instant,
}

/// What happened when a resolution timer fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The activation was already replaced (same id re-sent) or cleared.
    Stale,
    /// An older alert expired while a newer one still holds the intersection.
    Superseded,
    /// The current alert expired and an older, still running alert took the lane back.
    Handover { lane: Direction, remaining: u64 },
    /// No alerts left: normal operation resumes from the default layout.
    Cleared,
}

/// Tracks active emergency overrides. The most recent activation owns the
/// intersection; older ones only keep their timers.
#[derive(Debug, Default)]
pub struct EmergencyOverride {
    active: Vec<ActiveOverride>,
    next_seq: u64,
    responses: u64,
}

impl EmergencyOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the alert's lane green and every other lane red for the override
    /// duration, and returns the activation's sequence number.
    ///
    /// A duration whose expiry cannot be represented is rejected before any signal
    /// changes.
    pub fn activate(
        &mut self,
        state: &mut IntersectionState,
        mut alert: EmergencyAlert,
        now: Instant,
    ) -> Result<u64, ControlError> {
        let expires_at = now
            .checked_add(Duration::from_secs(alert.override_duration))
            .ok_or_else(|| {
                ControlError::invalid_alert(format!(
                    "override duration {}s is out of range",
                    alert.override_duration
                ))
            })?;
        self.active.retain(|o| o.alert.alert_id != alert.alert_id);

        alert.is_active = true;
        force_lane(state, alert.detected_lane, alert.override_duration);
        state.emergency_active = true;

        self.next_seq += 1;
        self.responses += 1;
        let seq = self.next_seq;
        self.active.push(ActiveOverride {
            expires_at,
            alert,
            seq,
        });
        Ok(seq)
    }

    /// Retires activation `seq` of `alert_id`.
    pub fn resolve(
        &mut self,
        state: &mut IntersectionState,
        alert_id: &str,
        seq: u64,
        now: Instant,
        config: &SignalConfig,
    ) -> Resolution {
        let Some(index) = self
            .active
            .iter()
            .position(|o| o.seq == seq && o.alert.alert_id == alert_id)
        else {
            return Resolution::Stale;
        };

        let was_current = index + 1 == self.active.len();
        let mut expired = self.active.remove(index);
        expired.alert.is_active = false;

        let Some(current) = self.active.last() else {
            state.emergency_active = false;
            state.reset_signals(config);
            return Resolution::Cleared;
        };
        if !was_current {
            return Resolution::Superseded;
        }

        let left = current.expires_at.saturating_duration_since(now);
        let remaining = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        let remaining = remaining.max(1);
        let lane = current.alert.detected_lane;
        force_lane(state, lane, remaining);
        Resolution::Handover { lane, remaining }
    }

    /// The alert currently holding the intersection.
    pub fn current(&self) -> Option<&EmergencyAlert> {
        self.active.last().map(|o| &o.alert)
    }

    pub fn active_alerts(&self) -> impl Iterator<Item = &EmergencyAlert> {
        self.active.iter().map(|o| &o.alert)
    }

    /// Alerts activated since startup.
    pub fn responses(&self) -> u64 {
        self.responses
    }
}

fn force_lane(state: &mut IntersectionState, lane: Direction, duration: u64) {
    for direction in Direction::ALL {
        let target = if direction == lane {
            LightState::Green
        } else {
            LightState::Red
        };
        state.signal_mut(direction).enter(target, duration);
    }
}
