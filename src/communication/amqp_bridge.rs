// RabbitMQ plumbing between the signal controller and its collaborators: the
// vehicle detector, the emergency reporting service and status consumers.

use crate::control_system::traffic_light_controller::TrafficLightController;
use crate::error::ControlError;
use crate::global_variables::{
    AMQP_URL, QUEUE_EMERGENCY_ALERTS, QUEUE_INTERSECTION_STATUS, QUEUE_VEHICLE_COUNTS,
};
use crate::monitoring::status_publisher::StatusSnapshot;
use crate::shared_data::{EmergencyReport, VehicleCountUpdate};
use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, Exchange, Publish, QueueDeclareOptions,
};
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_util::sync::CancellationToken;

/// Applies every vehicle count update from the `vehicle_counts` queue.
pub async fn consume_vehicle_counts(controller: TrafficLightController) -> Result<(), ControlError> {
    task::spawn_blocking(move || -> Result<(), ControlError> {
        let mut connection = Connection::insecure_open(AMQP_URL)?;
        let channel = connection.open_channel(None)?;
        let queue = channel.queue_declare(QUEUE_VEHICLE_COUNTS, QueueDeclareOptions::default())?;
        let consumer = queue.consume(ConsumerOptions::default())?;
        log::info!(
            "[TrafficController] Waiting for vehicle counts on '{}'...",
            QUEUE_VEHICLE_COUNTS
        );

        for message in consumer.receiver() {
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    let applied = serde_json::from_slice::<VehicleCountUpdate>(&delivery.body)
                        .map_err(ControlError::from)
                        .and_then(|update| controller.apply_count_update(&update));
                    if let Err(e) = applied {
                        log::warn!("[TrafficController] Dropping vehicle count update: {}", e);
                    }
                    consumer.ack(delivery)?;
                }
                other => {
                    log::info!("[TrafficController] Vehicle count consumer ended: {:?}", other);
                    break;
                }
            }
        }
        connection.close()?;
        Ok(())
    })
    .await
    .map_err(|e| ControlError::Join(e.to_string()))?
}

/// Activates an override for every valid report on the `emergency_alerts` queue.
pub async fn consume_emergency_alerts(
    controller: TrafficLightController,
) -> Result<(), ControlError> {
    task::spawn_blocking(move || -> Result<(), ControlError> {
        let mut connection = Connection::insecure_open(AMQP_URL)?;
        let channel = connection.open_channel(None)?;
        let queue =
            channel.queue_declare(QUEUE_EMERGENCY_ALERTS, QueueDeclareOptions::default())?;
        let consumer = queue.consume(ConsumerOptions::default())?;
        log::info!(
            "[TrafficController] Waiting for emergency alerts on '{}'...",
            QUEUE_EMERGENCY_ALERTS
        );

        for message in consumer.receiver() {
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    let activated = serde_json::from_slice::<EmergencyReport>(&delivery.body)
                        .map_err(ControlError::from)
                        .and_then(|report| report.into_alert(controller.config()))
                        .and_then(|alert| controller.activate(alert));
                    if let Err(e) = activated {
                        log::warn!(
                            "[TrafficController] Rejected emergency alert ({}): {}",
                            e.as_label(),
                            e
                        );
                    }
                    consumer.ack(delivery)?;
                }
                other => {
                    log::info!("[TrafficController] Emergency consumer ended: {:?}", other);
                    break;
                }
            }
        }
        connection.close()?;
        Ok(())
    })
    .await
    .map_err(|e| ControlError::Join(e.to_string()))?
}

/// Forwards each snapshot seen on `updates` to the `intersection_status` queue as
/// JSON until `cancel` fires or the controller goes away.
pub async fn publish_status(
    mut updates: watch::Receiver<StatusSnapshot>,
    cancel: CancellationToken,
) -> Result<(), ControlError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let publisher = task::spawn_blocking(move || -> Result<(), ControlError> {
        let mut connection = Connection::insecure_open(AMQP_URL)?;
        let channel = connection.open_channel(None)?;
        let exchange = Exchange::direct(&channel);
        channel.queue_declare(QUEUE_INTERSECTION_STATUS, QueueDeclareOptions::default())?;

        while let Some(payload) = rx.blocking_recv() {
            exchange.publish(Publish::new(payload.as_bytes(), QUEUE_INTERSECTION_STATUS))?;
        }
        connection.close()?;
        Ok(())
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        if tx.send(json).is_err() {
                            // Publisher thread exited; its result is reported below.
                            break;
                        }
                    }
                    Err(e) => log::warn!("[TrafficController] Could not encode status: {}", e),
                }
            }
        }
    }
    drop(tx);
    publisher
        .await
        .map_err(|e| ControlError::Join(e.to_string()))?
}
