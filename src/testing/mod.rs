//! Testing utilities and mock implementations
//!
//! Mock source and broker connectors for driving the bridge without a
//! socket or an MQTT broker.

pub mod mocks;

pub use mocks::*;
