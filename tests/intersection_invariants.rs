use adaptive_signal_control::simulation_engine::detection_feed::{run_detection_feed, DetectionFeed};
use adaptive_signal_control::{
    Direction, EmergencyAlert, LightState, SignalConfig, TrafficLightController,
};
use std::collections::HashMap;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

fn counts(n: u32, s: u32, e: u32, w: u32) -> HashMap<Direction, u32> {
    HashMap::from([
        (Direction::North, n),
        (Direction::South, s),
        (Direction::East, e),
        (Direction::West, w),
    ])
}

#[tokio::test(start_paused = true)]
async fn heavy_north_south_gets_max_green_empty_east_west_gets_min() {
    let controller = TrafficLightController::new(SignalConfig::default()).unwrap();
    controller.update_vehicle_counts(&counts(10, 10, 0, 0));

    for _ in 0..33 {
        controller.step().unwrap();
    }
    let status = controller.get_status();
    assert_eq!(status.signals[&Direction::East].state, LightState::Green);
    assert_eq!(status.signals[&Direction::East].remaining_time, 10);
    assert_eq!(status.signals[&Direction::North].state, LightState::Red);
    assert_eq!(status.signals[&Direction::North].remaining_time, 13);

    for _ in 0..13 {
        controller.step().unwrap();
    }
    let status = controller.get_status();
    assert_eq!(status.signals[&Direction::North].state, LightState::Green);
    assert_eq!(status.signals[&Direction::North].remaining_time, 120);
    assert_eq!(status.signals[&Direction::East].state, LightState::Red);
    assert_eq!(status.signals[&Direction::East].remaining_time, 123);
}

#[tokio::test(start_paused = true)]
async fn every_published_snapshot_respects_mutual_exclusion() {
    let controller = TrafficLightController::new(SignalConfig::default()).unwrap();
    let mut rx = controller.subscribe();
    controller.start();

    let cancel = CancellationToken::new();
    let feed = DetectionFeed::seeded(2024)
        .max_vehicles(14)
        .emergency_probability(0.05);
    let feeder = tokio::spawn(run_detection_feed(
        controller.clone(),
        feed,
        Duration::from_secs(3),
        cancel.clone(),
    ));

    let mut saw_emergency = false;
    let mut greens = HashMap::new();
    for _ in 0..5_000 {
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.is_consistent(), "{:?}", snapshot);
        saw_emergency |= snapshot.emergency_active;
        for lane in snapshot.active_lanes() {
            *greens.entry(lane).or_insert(0u32) += 1;
        }
    }
    assert!(saw_emergency);
    assert_eq!(greens.len(), 4, "some lane never turned green: {:?}", greens);

    cancel.cancel();
    feeder.await.unwrap();
    controller.shutdown().await;
    assert!(!controller.is_ready());
}

#[tokio::test(start_paused = true)]
async fn emergency_during_running_loop_resolves_back_to_normal_cycle() {
    let controller = TrafficLightController::new(SignalConfig::default()).unwrap();
    controller.start();
    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(
        controller.get_status().signals[&Direction::North].remaining_time,
        20
    );

    let alert = EmergencyAlert::new("amb-9", Direction::East, 45, controller.config()).unwrap();
    controller.activate(alert).unwrap();

    // The loop keeps ticking but leaves the forced layout alone.
    sleep(Duration::from_secs(44)).await;
    let status = controller.get_status();
    assert!(status.emergency_active);
    assert_eq!(status.signals[&Direction::East].state, LightState::Green);
    assert_eq!(status.signals[&Direction::North].state, LightState::Red);

    sleep(Duration::from_secs(2)).await;
    let status = controller.get_status();
    assert!(!status.emergency_active);
    assert_eq!(status.signals[&Direction::North].state, LightState::Green);
    assert_eq!(status.signals[&Direction::East].state, LightState::Red);

    controller.shutdown().await;
}
