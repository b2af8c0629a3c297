use adaptive_signal_control::communication::amqp_bridge::{
    consume_emergency_alerts, consume_vehicle_counts, publish_status,
};
use adaptive_signal_control::{LogObserver, SignalConfig, TrafficLightController};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Starting traffic controller...");

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

    // The consumers block on RabbitMQ and end with the process.
    let counts_controller = controller.clone();
    tokio::spawn(async move {
        if let Err(e) = consume_vehicle_counts(counts_controller).await {
            eprintln!("Error in vehicle count listener: {}", e);
        }
    });
    let alerts_controller = controller.clone();
    tokio::spawn(async move {
        if let Err(e) = consume_emergency_alerts(alerts_controller).await {
            eprintln!("Error in emergency alert listener: {}", e);
        }
    });
    let status_publisher = tokio::spawn(publish_status(controller.subscribe(), cancel.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
    }

    cancel.cancel();
    match status_publisher.await {
        Ok(Err(e)) => eprintln!("Error in status publisher: {}", e),
        Err(e) => eprintln!("Status publisher panicked: {}", e),
        Ok(Ok(())) => {}
    }
    controller.shutdown().await;
}
