use crate::control_system::emergency::EmergencyType;
use crate::control_system::signal::Direction;
use crate::control_system::traffic_light_controller::TrafficLightController;
use crate::shared_data::EmergencyReport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Stands in for the camera-based vehicle detector: random per-lane counts and the
/// occasional emergency vehicle.
pub struct DetectionFeed {
    rng: StdRng,
    max_vehicles: u32,
    emergency_probability: f64,
    next_alert: u64,
}

impl DetectionFeed {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic feed for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            max_vehicles: 15,
            emergency_probability: 0.02,
            next_alert: 1,
        }
    }

    pub fn max_vehicles(mut self, max_vehicles: u32) -> Self {
        self.max_vehicles = max_vehicles;
        self
    }

    pub fn emergency_probability(mut self, probability: f64) -> Self {
        self.emergency_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn next_counts(&mut self) -> HashMap<Direction, u32> {
        Direction::ALL
            .iter()
            .map(|&d| (d, self.rng.random_range(0..=self.max_vehicles)))
            .collect()
    }

    /// A report for a random lane, or `None` most of the time.
    pub fn next_emergency(&mut self) -> Option<EmergencyReport> {
        if !self.rng.random_bool(self.emergency_probability) {
            return None;
        }
        let lane = Direction::ALL[self.rng.random_range(0..Direction::ALL.len())];
        let emergency_type = match self.rng.random_range(0..4) {
            0 => EmergencyType::Ambulance,
            1 => EmergencyType::FireTruck,
            2 => EmergencyType::Police,
            _ => EmergencyType::Rescue,
        };
        let alert_id = format!("sim-{}", self.next_alert);
        self.next_alert += 1;

        Some(EmergencyReport {
            alert_id,
            emergency_type,
            detected_lane: lane.as_str().to_string(),
            priority_level: self.rng.random_range(1..=5),
            override_duration_secs: Some(self.rng.random_range(15..=45)),
        })
    }
}

impl Default for DetectionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Pushes a fresh detection into `controller` every `every` until cancelled.
pub async fn run_detection_feed(
    controller: TrafficLightController,
    mut feed: DetectionFeed,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let counts = feed.next_counts();
        log::debug!("[Detector] counts {:?}", counts);
        controller.update_vehicle_counts(&counts);

        if let Some(report) = feed.next_emergency() {
            log::info!(
                "[Detector] {:?} spotted on {} lane",
                report.emergency_type,
                report.detected_lane
            );
            let activated = report
                .into_alert(controller.config())
                .and_then(|alert| controller.activate(alert));
            if let Err(e) = activated {
                log::warn!("[Detector] Emergency report rejected: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;

    #[test]
    fn test_counts_cover_every_lane_within_bounds() {
        let mut feed = DetectionFeed::seeded(42).max_vehicles(6);
        for _ in 0..100 {
            let counts = feed.next_counts();
            assert_eq!(counts.len(), 4);
            assert!(counts.values().all(|&c| c <= 6));
        }
    }

    #[test]
    fn test_seeded_feeds_repeat() {
        let mut a = DetectionFeed::seeded(9);
        let mut b = DetectionFeed::seeded(9);
        for _ in 0..10 {
            assert_eq!(a.next_counts(), b.next_counts());
        }
    }

    #[test]
    fn test_generated_reports_are_valid_alerts() {
        let config = SignalConfig::default();
        let mut feed = DetectionFeed::seeded(3).emergency_probability(1.0);
        let first = feed.next_emergency().unwrap();
        let second = feed.next_emergency().unwrap();
        assert_ne!(first.alert_id, second.alert_id);
        assert!(first.into_alert(&config).is_ok());
        assert!(second.into_alert(&config).is_ok());

        let mut quiet = DetectionFeed::seeded(3).emergency_probability(0.0);
        assert!(quiet.next_emergency().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_updates_controller_until_cancelled() {
        let controller = TrafficLightController::new(SignalConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        let feed = DetectionFeed::seeded(11).max_vehicles(20).emergency_probability(0.0);
        let handle = tokio::spawn(run_detection_feed(
            controller.clone(),
            feed,
            Duration::from_secs(5),
            cancel.clone(),
        ));

        let mut rx = controller.subscribe();
        rx.changed().await.unwrap();
        let first = controller.get_status().last_updated;
        assert!(first > 0);

        cancel.cancel();
        handle.await.unwrap();
        controller.shutdown().await;
    }
}
