use crate::control_system::emergency::EmergencyOverride;
use crate::control_system::intersection_state::IntersectionState;
use crate::control_system::signal::{Direction, LightState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub direction: Direction,
    pub state: LightState,
    pub remaining_time: u64,
    pub next_state: Option<LightState>,
    pub phase_duration: u64,
}

/// Point-in-time copy of the intersection, safe to hand to any reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub signals: BTreeMap<Direction, SignalSnapshot>,
    pub vehicle_counts: BTreeMap<Direction, u32>,
    pub emergency_active: bool,
    pub emergency_lane: Option<Direction>,
    pub active_alerts: Vec<String>,
    pub cycle_count: u64,
    pub emergency_responses: u64,
    pub last_updated: u64,
}

impl StatusSnapshot {
    pub fn capture(state: &IntersectionState, emergency: &EmergencyOverride) -> Self {
        let signals = state
            .signals()
            .map(|s| {
                (
                    s.direction,
                    SignalSnapshot {
                        direction: s.direction,
                        state: s.state,
                        remaining_time: s.remaining_time,
                        next_state: s.next_state,
                        phase_duration: s.phase_duration,
                    },
                )
            })
            .collect();
        let vehicle_counts = Direction::ALL
            .iter()
            .map(|&d| (d, state.vehicle_count(d)))
            .collect();

        Self {
            signals,
            vehicle_counts,
            emergency_active: state.emergency_active,
            emergency_lane: emergency.current().map(|a| a.detected_lane),
            active_alerts: emergency
                .active_alerts()
                .map(|a| a.alert_id.clone())
                .collect(),
            cycle_count: state.cycle_count,
            emergency_responses: emergency.responses(),
            last_updated: state.last_updated,
        }
    }

    pub fn state_of(&self, direction: Direction) -> Option<LightState> {
        self.signals.get(&direction).map(|s| s.state)
    }

    /// Lanes currently green or yellow.
    pub fn active_lanes(&self) -> Vec<Direction> {
        self.signals
            .values()
            .filter(|s| s.state.is_active())
            .map(|s| s.direction)
            .collect()
    }

    /// No two crossing lanes are green or yellow together.
    pub fn is_consistent(&self) -> bool {
        let active = self.active_lanes();
        active
            .iter()
            .all(|a| active.iter().all(|b| !a.is_perpendicular_to(*b)))
    }

    /// One line for logs: `N:GREEN(12) S:GREEN(12) E:RED(15) W:RED(15)`.
    pub fn summary(&self) -> String {
        self.signals
            .values()
            .map(|s| {
                format!(
                    "{}:{:?}({})",
                    s.direction.as_str().chars().next().unwrap_or('?').to_ascii_uppercase(),
                    s.state,
                    s.remaining_time
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Holds the latest snapshot for push-style consumers. Publishing never waits on
/// readers.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusPublisher {
    pub fn new(initial: StatusSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }
}

/// Receives the snapshot produced by every tick of the control loop.
///
/// An error here counts as a transient tick failure: the loop logs it, backs off
/// and keeps running.
pub trait TickObserver: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn on_tick(&self, snapshot: &StatusSnapshot) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Logs a one-line summary of each tick at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TickObserver for LogObserver {
    fn name(&self) -> &'static str {
        "log"
    }

    fn on_tick(&self, snapshot: &StatusSnapshot) -> Result<(), Box<dyn Error + Send + Sync>> {
        if snapshot.emergency_active {
            log::debug!(
                "[Intersection] EMERGENCY {:?} {}",
                snapshot.emergency_lane,
                snapshot.summary()
            );
        } else {
            log::debug!("[Intersection] {}", snapshot.summary());
        }
        Ok(())
    }
}
