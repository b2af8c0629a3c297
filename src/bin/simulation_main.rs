// simulation_main.rs
use adaptive_signal_control::simulation_engine::detection_feed::{run_detection_feed, DetectionFeed};
use adaptive_signal_control::{LogObserver, SignalConfig, TrafficLightController};
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match SignalConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return;
        }
    };
    let controller = match TrafficLightController::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Controller error: {}", e);
            return;
        }
    };
    controller.add_observer(Arc::new(LogObserver));
    controller.start();

    let cancel = CancellationToken::new();
    let feed = tokio::spawn(run_detection_feed(
        controller.clone(),
        DetectionFeed::new(),
        Duration::from_secs(5),
        cancel.clone(),
    ));

    println!("Simulating intersection, press Ctrl-C to stop...");
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
    }

    cancel.cancel();
    let _ = feed.await;
    controller.shutdown().await;
    println!("Final status: {}", controller.get_status().summary());
}
