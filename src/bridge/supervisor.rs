//! Connection supervisor
//!
//! The heartbeat is the only place connection handles are created. Handles
//! are cleared by their own close/error events; the next heartbeat notices
//! the empty slot and starts over.

use super::events::{BrokerEvent, Epoch, SourceEvent};
use super::state::{BrokerSlot, PumpLock, SourceSlot};
use super::Bridge;
use crate::transport::{BrokerConnector, BrokerHandle, SourceConnector, SourceHandle};
use tracing::{debug, error, info, warn};

impl<S, B> Bridge<S, B>
where
    S: SourceConnector,
    B: BrokerConnector,
{
    /// One supervisor tick: recreate whichever connection is absent
    pub fn heartbeat(&mut self) {
        if self.state.source.is_none() {
            self.open_source();
        }
        if self.state.broker.is_none() {
            self.open_broker();
        }
    }

    fn open_source(&mut self) {
        let epoch = self.state.next_epoch();
        info!(
            epoch,
            host = %self.config.source.host,
            port = self.config.source.port,
            "Connecting to source"
        );
        self.metrics.source_connection_attempt();

        let handle = self.source_connector.connect(epoch, self.events_tx.clone());
        self.state.source = Some(SourceSlot {
            epoch,
            handle,
            connected: false,
        });
    }

    fn open_broker(&mut self) {
        let epoch = self.state.next_epoch();
        info!(
            epoch,
            broker = %self.config.broker.normalized_address(),
            "Connecting to MQTT broker"
        );
        self.metrics.broker_connection_attempt();

        self.state.broker_online = false;
        self.state.active_topic = self.config.broker.topic.clone();
        if !self.state.pump.is_locked() {
            self.state.pump = PumpLock::AwaitingBroker;
        }

        let handle = self.broker_connector.connect(epoch, self.events_tx.clone());
        self.state.broker = Some(BrokerSlot {
            epoch,
            handle,
            acknowledged: false,
        });
    }

    pub(super) fn on_source_event(&mut self, epoch: Epoch, event: SourceEvent) {
        if self.state.source_epoch() != Some(epoch) {
            debug!(epoch, ?event, "Ignoring event from stale source connection");
            return;
        }

        match event {
            SourceEvent::Connected { peer, local } => {
                info!(epoch, %peer, %local, "Socket connected");
                if let Some(slot) = self.state.source.as_mut() {
                    slot.connected = true;
                }
                self.metrics.source_connection_established();
            }
            SourceEvent::Data(chunk) => self.ingest(&chunk),
            SourceEvent::Timeout => {
                info!(epoch, "Socket timeout");
            }
            SourceEvent::Disconnected => {
                info!(epoch, "Socket disconnected");
                self.release_source(false);
            }
            SourceEvent::Error(e) => {
                error!(epoch, error = %e, "Socket error");
                self.release_source(true);
            }
        }
    }

    /// Clear the source slot and drop any partial frame from the old stream
    fn release_source(&mut self, force_close: bool) {
        if let Some(mut slot) = self.state.source.take() {
            if force_close {
                slot.handle.close();
            }
            if slot.connected {
                self.metrics.source_connection_lost();
            }
        }

        let partial = self.state.decoder.buffered_len();
        self.state.decoder.reset();
        if partial > 0 {
            debug!(bytes = partial, "Discarded partial frame from closed source");
        }
    }

    pub(super) fn on_broker_event(&mut self, epoch: Epoch, event: BrokerEvent) {
        if self.state.broker_epoch() != Some(epoch) {
            debug!(epoch, ?event, "Ignoring event from stale MQTT client");
            return;
        }

        match event {
            BrokerEvent::Connected => {
                info!(
                    epoch,
                    broker = %self.config.broker.normalized_address(),
                    "Connected to MQTT broker"
                );
                self.state.broker_online = true;
                if let Some(slot) = self.state.broker.as_mut() {
                    slot.acknowledged = true;
                }
                self.metrics.broker_connection_established();

                if self.state.pump == PumpLock::AwaitingBroker {
                    self.state.pump = PumpLock::Released;
                }
                self.drain();
            }
            BrokerEvent::Reconnecting { attempt } => {
                info!(epoch, attempt, "Reconnecting to MQTT broker");
                self.state.broker_online = false;
            }
            BrokerEvent::Offline => {
                warn!(epoch, "MQTT broker connection offline");
                self.state.broker_online = false;
            }
            BrokerEvent::Error(e) => {
                error!(epoch, error = %e, "MQTT error");
            }
            BrokerEvent::Closed => {
                info!(epoch, "MQTT broker connection closed");
                self.release_broker();
            }
            BrokerEvent::PublishCompleted(result) => self.on_publish_completed(epoch, result),
        }
    }

    /// Clear the broker slot; an outstanding publish goes back to the head
    fn release_broker(&mut self) {
        self.state.broker_online = false;
        if let Some(mut slot) = self.state.broker.take() {
            slot.handle.close();
        }
        self.metrics.broker_connection_closed();

        if let PumpLock::InFlight { message, .. } = std::mem::take(&mut self.state.pump) {
            debug!("Returning in-flight message to buffer");
            self.state.pending.requeue_front(message);
            self.metrics.set_backlog(self.state.pending.len());
        }
    }
}
