//! Link state shared by the supervisor, decoder and publish pump
//!
//! One value per process, owned by the [`Bridge`](super::Bridge) task. The
//! connection slots hold at most one live handle each; replacing a handle
//! always goes through `None` first.

use super::buffer::MessageBuffer;
use super::events::Epoch;
use crate::config::BridgeConfig;
use crate::framing::{decoder_for, FrameDecoder};

/// Live source connection and the epoch it reports under
pub struct SourceSlot<H> {
    pub epoch: Epoch,
    pub handle: H,
    /// TCP handshake completed
    pub connected: bool,
}

/// Live broker client and the epoch it reports under
pub struct BrokerSlot<H> {
    pub epoch: Epoch,
    pub handle: H,
    /// Broker acknowledged this client at least once
    pub acknowledged: bool,
}

/// Publish pump mutual exclusion.
///
/// Anything other than `Released` means no publish may be issued. Only the
/// pump moves the lock into `InFlight` and back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PumpLock {
    #[default]
    Released,
    /// A broker client was just created and has not confirmed its connection
    AwaitingBroker,
    /// A publish request is outstanding; the message returns to the head on failure
    InFlight { message: String, epoch: Epoch },
}

impl PumpLock {
    pub fn is_locked(&self) -> bool {
        !matches!(self, PumpLock::Released)
    }
}

/// Broker link as seen from the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerLink {
    /// No client handle; the next heartbeat creates one
    Absent,
    /// Handle created, no acknowledgement yet
    Connecting,
    Online,
    /// Handle retained while the client reconnects on its own
    Offline,
}

/// Mutable record of both links, the framing accumulator and the backlog
pub struct LinkState<S, B> {
    pub(crate) source: Option<SourceSlot<S>>,
    pub(crate) broker: Option<BrokerSlot<B>>,
    pub(crate) broker_online: bool,
    pub(crate) active_topic: String,
    pub(crate) decoder: Box<dyn FrameDecoder>,
    pub(crate) pending: MessageBuffer,
    pub(crate) pump: PumpLock,
    last_epoch: Epoch,
}

impl<S, B> LinkState<S, B> {
    /// Empty buffers, both connections absent
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            source: None,
            broker: None,
            broker_online: false,
            active_topic: config.broker.topic.clone(),
            decoder: decoder_for(config.source.framing),
            pending: MessageBuffer::from_config(&config.buffer),
            pump: PumpLock::Released,
            last_epoch: 0,
        }
    }

    /// Allocate the epoch for a new connection handle
    pub(crate) fn next_epoch(&mut self) -> Epoch {
        self.last_epoch += 1;
        self.last_epoch
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn source_connected(&self) -> bool {
        self.source.as_ref().is_some_and(|slot| slot.connected)
    }

    pub fn source_epoch(&self) -> Option<Epoch> {
        self.source.as_ref().map(|slot| slot.epoch)
    }

    pub fn has_broker(&self) -> bool {
        self.broker.is_some()
    }

    pub fn broker_epoch(&self) -> Option<Epoch> {
        self.broker.as_ref().map(|slot| slot.epoch)
    }

    pub fn broker_online(&self) -> bool {
        self.broker_online
    }

    pub fn broker_link(&self) -> BrokerLink {
        match &self.broker {
            None => BrokerLink::Absent,
            Some(_) if self.broker_online => BrokerLink::Online,
            Some(slot) if slot.acknowledged => BrokerLink::Offline,
            Some(_) => BrokerLink::Connecting,
        }
    }

    pub fn active_topic(&self) -> &str {
        &self.active_topic
    }

    pub fn pending(&self) -> &MessageBuffer {
        &self.pending
    }

    pub fn pump(&self) -> &PumpLock {
        &self.pump
    }

    pub fn is_publish_in_flight(&self) -> bool {
        matches!(self.pump, PumpLock::InFlight { .. })
    }

    /// Bytes of a partial frame waiting for their delimiter
    pub fn accumulated_len(&self) -> usize {
        self.decoder.buffered_len()
    }
}
