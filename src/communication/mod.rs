pub mod amqp_bridge;
