//! Socket Queue Bridge
//!
//! Forwards messages from a raw TCP data source (a PLC or sensor) to a topic
//! on an MQTT broker.
//!
//! # Overview
//!
//! - Stream framing: STX/ETX control-byte frames or newline-delimited text
//! - In-memory FIFO of decoded messages, delivered in arrival order
//! - Publish pump with at most one publish in flight; failures go back to the
//!   head of the queue
//! - Connection supervisor that recreates either connection on a heartbeat
//! - rumqttc v5 broker client with its own reconnection policy
//!
//! # Quick Start
//!
//! ```rust
//! use socket_queue_bridge::framing::{BinaryFrameDecoder, FrameDecoder};
//!
//! let mut decoder = BinaryFrameDecoder::new();
//! let first = decoder.decode(b"\x0241\x03\x024");
//! let second = decoder.decode(b"2\x03");
//!
//! assert_eq!(first.messages, vec!["41"]);
//! assert_eq!(second.messages, vec!["42"]);
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod framing;
pub mod observability;
pub mod testing;
pub mod transport;

pub use bridge::{Bridge, BridgeEvent, BrokerEvent, SourceEvent};
pub use config::*;
pub use error::{BridgeError, BridgeResult};
pub use framing::{FrameDecoder, FramingMode};
pub use transport::mqtt::MqttBrokerConnector;
pub use transport::tcp::TcpSourceConnector;
