pub mod duration_policy;
pub mod emergency;
pub mod intersection_state;
pub mod signal;
pub mod traffic_light_controller;
