//! Transport capability layer
//!
//! The bridge consumes both endpoints through these traits and never speaks
//! TCP or MQTT itself. Implementations must not block the caller: `connect`
//! spawns whatever it needs and returns a handle immediately, and everything
//! that happens later on that connection is reported as a
//! [`BridgeEvent`](crate::bridge::BridgeEvent) tagged with the epoch passed to
//! `connect`.

use crate::bridge::{Epoch, EventSender};
use rumqttc::v5::mqttbytes::QoS;

pub mod mqtt;
pub mod tcp;

/// Creates connections to the raw data source
///
/// The handle must report [`SourceEvent`](crate::bridge::SourceEvent)s:
/// `Data` for every chunk read, `Disconnected` when the peer closes, `Timeout`
/// after an idle period, `Error` on connect failure or socket error.
pub trait SourceConnector: Send {
    type Handle: SourceHandle;

    fn connect(&self, epoch: Epoch, events: EventSender) -> Self::Handle;
}

/// Live source connection
pub trait SourceHandle: Send {
    /// Tear the connection down; no further events are expected
    fn close(&mut self);
}

/// Creates MQTT broker clients
///
/// The handle must report [`BrokerEvent`](crate::bridge::BrokerEvent)s:
/// `Connected` on acknowledgement, `Offline`/`Reconnecting` while the client
/// recovers on its own, `Closed` once it gives up, and exactly one
/// `PublishCompleted` for every accepted [`BrokerHandle::publish`] call.
pub trait BrokerConnector: Send {
    type Handle: BrokerHandle;

    fn connect(&self, epoch: Epoch, events: EventSender) -> Self::Handle;
}

/// Live broker client
pub trait BrokerHandle: Send {
    /// Submit a publish request. `Ok` means the request was accepted and a
    /// `PublishCompleted` event will follow; `Err` means it was rejected
    /// synchronously and no event will follow.
    fn publish(&mut self, topic: &str, payload: &str, qos: QoS) -> Result<(), mqtt::MqttError>;

    /// Disconnect and stop the client
    fn close(&mut self);
}
