use crate::config::SignalConfig;
use crate::control_system::signal::{Direction, LightState, Signal};
use std::collections::HashMap;

/// Everything the controller knows about the intersection: the four signals, the
/// latest vehicle counts and the emergency flag.
///
/// Signals and counts are stored in fixed arrays indexed by `Direction::index`, so
/// every direction is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectionState {
    signals: [Signal; 4],
    vehicle_counts: [u32; 4],
    pub emergency_active: bool,
    /// Unix milliseconds of the most recent tick or external update.
    pub last_updated: u64,
    /// Completed green phases since startup.
    pub cycle_count: u64,
}

impl IntersectionState {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            signals: default_signals(config),
            vehicle_counts: [0; 4],
            emergency_active: false,
            last_updated: 0,
            cycle_count: 0,
        }
    }

    /// North/south green for the base duration, east/west red until that green and
    /// its yellow have run out.
    pub fn reset_signals(&mut self, config: &SignalConfig) {
        self.signals = default_signals(config);
    }

    pub fn signal(&self, direction: Direction) -> &Signal {
        &self.signals[direction.index()]
    }

    pub fn signal_mut(&mut self, direction: Direction) -> &mut Signal {
        &mut self.signals[direction.index()]
    }

    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    pub fn vehicle_count(&self, direction: Direction) -> u32 {
        self.vehicle_counts[direction.index()]
    }

    /// Replaces all counts at once; directions missing from `counts` become 0.
    pub fn replace_vehicle_counts(&mut self, counts: &HashMap<Direction, u32>) {
        for direction in Direction::ALL {
            self.vehicle_counts[direction.index()] = counts.get(&direction).copied().unwrap_or(0);
        }
    }

    /// True when no two crossing lanes are green or yellow at the same time.
    pub fn is_mutually_exclusive(&self) -> bool {
        Direction::ALL.iter().all(|&d| {
            !self.signal(d).state.is_active()
                || d
                    .perpendicular()
                    .iter()
                    .all(|&p| self.signal(p).state == LightState::Red)
        })
    }
}

fn default_signals(config: &SignalConfig) -> [Signal; 4] {
    let green = config.base_green_secs;
    let red = config.base_green_secs + config.yellow_secs;
    [
        Signal::new(Direction::North, LightState::Green, green),
        Signal::new(Direction::South, LightState::Green, green),
        Signal::new(Direction::East, LightState::Red, red),
        Signal::new(Direction::West, LightState::Red, red),
    ]
}
