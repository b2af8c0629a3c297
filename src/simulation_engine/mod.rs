// simulation_engine/mod.rs
pub mod detection_feed;
