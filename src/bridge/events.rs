//! Events delivered to the bridge task
//!
//! Transport adapters never touch link state directly. They report what
//! happened on their connection as a [`BridgeEvent`] tagged with the epoch of
//! the handle that produced it.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Identifier of one connection handle's lifetime
pub type Epoch = u64;

/// Sender half handed to every connection a supervisor creates
pub type EventSender = mpsc::Sender<BridgeEvent>;

/// Receiver half consumed by the bridge task
pub type EventReceiver = mpsc::Receiver<BridgeEvent>;

/// Capacity of the bridge event channel; a full channel applies backpressure
/// to the socket reader
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Event from the source socket
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// TCP connection established
    Connected { peer: String, local: String },
    /// Raw chunk read from the socket
    Data(Bytes),
    /// No data for the configured idle period; connection stays up
    Timeout,
    /// Remote end closed the connection
    Disconnected,
    /// Connect failure or socket error
    Error(String),
}

/// Event from the broker client
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// Broker acknowledged the connection
    Connected,
    /// Client is about to retry the connection on its own
    Reconnecting { attempt: u32 },
    /// Connection to the broker lost; client handle kept
    Offline,
    /// Error reported by the client; informational only
    Error(String),
    /// Client gave up; handle must be recreated
    Closed,
    /// Outcome of the single outstanding publish request
    PublishCompleted(Result<(), String>),
}

/// Everything the bridge task reacts to besides its own timers
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Source { epoch: Epoch, event: SourceEvent },
    Broker { epoch: Epoch, event: BrokerEvent },
}

impl BridgeEvent {
    pub fn source(epoch: Epoch, event: SourceEvent) -> Self {
        Self::Source { epoch, event }
    }

    pub fn broker(epoch: Epoch, event: BrokerEvent) -> Self {
        Self::Broker { epoch, event }
    }

    pub fn epoch(&self) -> Epoch {
        match self {
            Self::Source { epoch, .. } | Self::Broker { epoch, .. } => *epoch,
        }
    }
}
