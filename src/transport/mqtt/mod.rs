//! MQTT broker adapter built on rumqttc v5
//!
//! Pure functions are kept apart from the I/O task so the decisions can be
//! tested without a broker.
//!
//! # Architecture
//!
//! - [`connection`] - address normalization, endpoint parsing, client options
//! - [`message_handler`] - event routing and publish acknowledgement tracking
//! - [`health_monitor`] - reconnection decisions and state transitions
//! - [`client`] - connector, handle and event loop task
//!
//! # Usage
//!
//! ```rust,no_run
//! use socket_queue_bridge::bridge::event_channel;
//! use socket_queue_bridge::config::BrokerSection;
//! use socket_queue_bridge::transport::mqtt::MqttBrokerConnector;
//! use socket_queue_bridge::transport::BrokerConnector;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = MqttBrokerConnector::new(&BrokerSection::default())?;
//! let (events_tx, mut events_rx) = event_channel();
//! let _handle = connector.connect(1, events_tx);
//! while let Some(event) = events_rx.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

pub use client::{MqttBrokerConnector, MqttBrokerHandle};
pub use connection::{
    configure_mqtt_options, normalize_broker_address, BrokerEndpoint, ConnectionState, MqttError,
    ReconnectConfig,
};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler, PublishTracker};
