//! Mock connectors for testing
//!
//! Both mocks record every connection and request they see and hand the
//! bridge's event sender back to the test, so tests can play the part of the
//! socket or the broker without any network.

use crate::bridge::{BridgeEvent, BrokerEvent, Epoch, EventSender, SourceEvent};
use crate::transport::mqtt::{ConnectionState, MqttError};
use crate::transport::{BrokerConnector, BrokerHandle, SourceConnector, SourceHandle};
use rumqttc::v5::mqttbytes::QoS;
use std::sync::{Arc, Mutex, MutexGuard};

/// One publish request accepted by [`MockBrokerHandle`]
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub epoch: Epoch,
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct SourceLog {
    connects: Vec<Epoch>,
    closed: Vec<Epoch>,
    senders: Vec<(Epoch, EventSender)>,
}

/// Source connector whose connections only exist on paper
#[derive(Debug, Clone, Default)]
pub struct MockSourceConnector {
    log: Arc<Mutex<SourceLog>>,
}

impl MockSourceConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.log).connects.len()
    }

    pub fn connected_epochs(&self) -> Vec<Epoch> {
        lock(&self.log).connects.clone()
    }

    /// Epochs whose handle was closed explicitly
    pub fn closed_epochs(&self) -> Vec<Epoch> {
        lock(&self.log).closed.clone()
    }

    pub fn last_epoch(&self) -> Option<Epoch> {
        lock(&self.log).connects.last().copied()
    }

    /// Deliver `event` as if it came from the most recent connection.
    /// Returns false if there is none or the bridge is gone.
    pub async fn send(&self, event: SourceEvent) -> bool {
        let latest = lock(&self.log).senders.last().cloned();
        match latest {
            Some((epoch, sender)) => sender.send(BridgeEvent::source(epoch, event)).await.is_ok(),
            None => false,
        }
    }
}

impl SourceConnector for MockSourceConnector {
    type Handle = MockSourceHandle;

    fn connect(&self, epoch: Epoch, events: EventSender) -> MockSourceHandle {
        let mut log = lock(&self.log);
        log.connects.push(epoch);
        log.senders.push((epoch, events));

        MockSourceHandle {
            epoch,
            log: self.log.clone(),
            closed: false,
        }
    }
}

#[derive(Debug)]
pub struct MockSourceHandle {
    epoch: Epoch,
    log: Arc<Mutex<SourceLog>>,
    closed: bool,
}

impl SourceHandle for MockSourceHandle {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.log).closed.push(self.epoch);
        }
    }
}

/// How the mock broker answers without test intervention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockBrokerBehavior {
    /// Report `Connected` as soon as a client is created
    pub auto_connect: bool,
    /// Report a successful completion for every accepted publish
    pub auto_ack: bool,
    /// Reject every publish synchronously
    pub reject_publishes: bool,
}

#[derive(Debug, Default)]
struct BrokerLog {
    behavior: MockBrokerBehavior,
    connects: Vec<Epoch>,
    closed: Vec<Epoch>,
    published: Vec<PublishedMessage>,
    rejected: usize,
    senders: Vec<(Epoch, EventSender)>,
}

/// Broker connector that records publishes instead of sending them
#[derive(Debug, Clone, Default)]
pub struct MockBrokerConnector {
    log: Arc<Mutex<BrokerLog>>,
}

impl MockBrokerConnector {
    /// Broker that does nothing until the test sends events
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker that connects immediately and acknowledges every publish
    pub fn auto() -> Self {
        Self::with_behavior(MockBrokerBehavior {
            auto_connect: true,
            auto_ack: true,
            reject_publishes: false,
        })
    }

    pub fn with_behavior(behavior: MockBrokerBehavior) -> Self {
        let connector = Self::default();
        lock(&connector.log).behavior = behavior;
        connector
    }

    pub fn set_reject_publishes(&self, reject: bool) {
        lock(&self.log).behavior.reject_publishes = reject;
    }

    pub fn set_auto_ack(&self, auto_ack: bool) {
        lock(&self.log).behavior.auto_ack = auto_ack;
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.log).connects.len()
    }

    pub fn connected_epochs(&self) -> Vec<Epoch> {
        lock(&self.log).connects.clone()
    }

    pub fn closed_epochs(&self) -> Vec<Epoch> {
        lock(&self.log).closed.clone()
    }

    pub fn last_epoch(&self) -> Option<Epoch> {
        lock(&self.log).connects.last().copied()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.log).published.clone()
    }

    pub fn published_payloads(&self) -> Vec<String> {
        lock(&self.log)
            .published
            .iter()
            .map(|message| message.payload.clone())
            .collect()
    }

    pub fn rejected_count(&self) -> usize {
        lock(&self.log).rejected
    }

    /// Deliver `event` as if it came from the most recent client
    pub async fn send(&self, event: BrokerEvent) -> bool {
        let latest = lock(&self.log).senders.last().cloned();
        match latest {
            Some((epoch, sender)) => sender.send(BridgeEvent::broker(epoch, event)).await.is_ok(),
            None => false,
        }
    }
}

impl BrokerConnector for MockBrokerConnector {
    type Handle = MockBrokerHandle;

    fn connect(&self, epoch: Epoch, events: EventSender) -> MockBrokerHandle {
        let mut log = lock(&self.log);
        log.connects.push(epoch);
        log.senders.push((epoch, events.clone()));

        if log.behavior.auto_connect {
            let _ = events.try_send(BridgeEvent::broker(epoch, BrokerEvent::Connected));
        }

        MockBrokerHandle {
            epoch,
            log: self.log.clone(),
            events,
            closed: false,
        }
    }
}

#[derive(Debug)]
pub struct MockBrokerHandle {
    epoch: Epoch,
    log: Arc<Mutex<BrokerLog>>,
    events: EventSender,
    closed: bool,
}

impl BrokerHandle for MockBrokerHandle {
    fn publish(&mut self, topic: &str, payload: &str, qos: QoS) -> Result<(), MqttError> {
        let mut log = lock(&self.log);
        if self.closed {
            return Err(MqttError::Closed);
        }
        if log.behavior.reject_publishes {
            log.rejected += 1;
            return Err(MqttError::NotConnected {
                state: ConnectionState::Disconnected("mock rejection".to_string()),
            });
        }

        log.published.push(PublishedMessage {
            epoch: self.epoch,
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
        });

        if log.behavior.auto_ack {
            let completed = BridgeEvent::broker(self.epoch, BrokerEvent::PublishCompleted(Ok(())));
            let _ = self.events.try_send(completed);
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.log).closed.push(self.epoch);
        }
    }
}
