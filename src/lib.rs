//! Adaptive signal control for a single four-way intersection.
//!
//! Green time follows live per-lane vehicle counts, crossing lanes are never active
//! together, and emergency alerts preempt the normal cycle for a bounded time.
//!
//! ```text
//!  detector ──counts──► TrafficLightController ◄──alerts── emergency reports
//!                          │  tick loop (1s)
//!                          │  DurationPolicy / EmergencyOverride
//!                          ▼
//!                    StatusPublisher ──snapshots──► API / WebSocket / analytics
//! ```

pub mod communication;
pub mod config;
pub mod control_system;
pub mod error;
pub mod global_variables;
pub mod monitoring;
pub mod shared_data;
pub mod simulation_engine;

pub use config::SignalConfig;
pub use control_system::emergency::{EmergencyAlert, EmergencyType};
pub use control_system::signal::{Direction, LightState};
pub use control_system::traffic_light_controller::TrafficLightController;
pub use error::ControlError;
pub use monitoring::status_publisher::{LogObserver, StatusSnapshot, TickObserver};
