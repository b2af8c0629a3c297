use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One approach into the intersection. Each direction owns exactly one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

/// Lanes crossing each direction, indexed by `Direction::index`.
const PERPENDICULAR: [[Direction; 2]; 4] = [
    [Direction::East, Direction::West],
    [Direction::East, Direction::West],
    [Direction::North, Direction::South],
    [Direction::North, Direction::South],
];

impl Direction {
    /// Fixed processing order. The north/south pair comes first and is the default pair.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    /// The lane sharing a phase with this one.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// The two lanes whose traffic conflicts with this one.
    pub fn perpendicular(self) -> [Direction; 2] {
        PERPENDICULAR[self.index()]
    }

    pub fn is_perpendicular_to(self, other: Direction) -> bool {
        self.perpendicular().contains(&other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Direction::North),
            "south" => Ok(Direction::South),
            "east" => Ok(Direction::East),
            "west" => Ok(Direction::West),
            _ => Err(ControlError::UnknownDirection(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

impl LightState {
    /// Green or yellow: traffic is still allowed into the box.
    pub fn is_active(self) -> bool {
        !matches!(self, LightState::Red)
    }
}

/// A single lane's signal head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub direction: Direction,
    pub state: LightState,
    /// Seconds until the next transition is due.
    pub remaining_time: u64,
    /// Precomputed successor, set while green or yellow.
    pub next_state: Option<LightState>,
    /// Length of the phase currently being timed.
    pub phase_duration: u64,
    /// Ticks spent red with an expired timer while a crossing lane held the box.
    pub waiting_ticks: u64,
}

impl Signal {
    pub fn new(direction: Direction, state: LightState, remaining_time: u64) -> Self {
        Self {
            direction,
            state,
            remaining_time,
            next_state: successor(state),
            phase_duration: remaining_time,
            waiting_ticks: 0,
        }
    }

    /// Starts a fresh phase in `state` lasting `duration` seconds.
    pub fn enter(&mut self, state: LightState, duration: u64) {
        self.state = state;
        self.remaining_time = duration;
        self.phase_duration = duration;
        self.next_state = successor(state);
        self.waiting_ticks = 0;
    }

    /// Red with an expired timer: due to turn green once the crossing lanes clear.
    pub fn is_waiting(&self) -> bool {
        self.state == LightState::Red && self.remaining_time == 0
    }

    /// Seconds the current phase has been running.
    pub fn elapsed(&self) -> u64 {
        self.phase_duration.saturating_sub(self.remaining_time)
    }
}

fn successor(state: LightState) -> Option<LightState> {
    match state {
        LightState::Green => Some(LightState::Yellow),
        LightState::Yellow => Some(LightState::Red),
        LightState::Red => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perpendicular_table_is_symmetric() {
        for d in Direction::ALL {
            for p in d.perpendicular() {
                assert!(p.is_perpendicular_to(d), "{} / {}", d, p);
            }
            assert!(!d.is_perpendicular_to(d.opposite()));
            assert_eq!(d.opposite().opposite(), d);
        }
    }

    #[test]
    fn test_direction_parses_case_insensitively() {
        assert_eq!("NORTH".parse::<Direction>().unwrap(), Direction::North);
        assert_eq!(" west ".parse::<Direction>().unwrap(), Direction::West);
        assert!(matches!(
            "up".parse::<Direction>(),
            Err(ControlError::UnknownDirection(_))
        ));
    }

    #[test]
    fn test_enter_resets_phase_metadata() {
        let mut signal = Signal::new(Direction::East, LightState::Red, 0);
        signal.waiting_ticks = 4;
        signal.enter(LightState::Green, 25);
        assert_eq!(signal.state, LightState::Green);
        assert_eq!(signal.remaining_time, 25);
        assert_eq!(signal.phase_duration, 25);
        assert_eq!(signal.next_state, Some(LightState::Yellow));
        assert_eq!(signal.waiting_ticks, 0);
    }

    #[test]
    fn test_yellow_precomputes_red() {
        let signal = Signal::new(Direction::North, LightState::Yellow, 3);
        assert_eq!(signal.next_state, Some(LightState::Red));
        assert_eq!(Signal::new(Direction::North, LightState::Red, 3).next_state, None);
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Direction::East).unwrap(), "\"EAST\"");
        assert_eq!(serde_json::to_string(&LightState::Yellow).unwrap(), "\"YELLOW\"");
    }
}
