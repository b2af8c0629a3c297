//! Green and red durations derived from vehicle counts.
//!
//! Counts are banded rather than scaled linearly:
//!
//! | vehicles | green time            |
//! |----------|-----------------------|
//! | 0        | `min_green_secs`      |
//! | 1-3      | `base_green_secs`     |
//! | 4-8      | `base_green_secs` x 1.5 |
//! | 9+       | `max_green_secs`      |
//!
//! and always clamped to `[min_green_secs, max_green_secs]`. A lane with no traffic
//! still receives the minimum green.
//!
//! A lane's red time covers the longest green-plus-yellow of the lanes crossing it.

use crate::config::SignalConfig;
use crate::control_system::intersection_state::IntersectionState;
use crate::control_system::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPolicy {
    base_green: u64,
    yellow: u64,
    min_green: u64,
    max_green: u64,
}

impl DurationPolicy {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            base_green: config.base_green_secs,
            yellow: config.yellow_secs,
            min_green: config.min_green_secs,
            max_green: config.max_green_secs,
        }
    }

    pub fn green_for_count(&self, vehicles: u32) -> u64 {
        let banded = match vehicles {
            0 => self.min_green,
            1..=3 => self.base_green,
            4..=8 => self.base_green.saturating_mul(3) / 2,
            _ => self.max_green,
        };
        banded.clamp(self.min_green, self.max_green)
    }

    pub fn green_duration(&self, state: &IntersectionState, direction: Direction) -> u64 {
        self.green_for_count(state.vehicle_count(direction))
    }

    /// Long enough for every crossing lane to run a full green and yellow.
    pub fn red_duration(&self, state: &IntersectionState, direction: Direction) -> u64 {
        direction
            .perpendicular()
            .iter()
            .map(|&p| self.green_duration(state, p).saturating_add(self.yellow))
            .max()
            .unwrap_or(self.min_green.saturating_add(self.yellow))
    }

    pub fn yellow(&self) -> u64 {
        self.yellow
    }

    pub fn min_green(&self) -> u64 {
        self.min_green
    }
}
