//! Pure MQTT event routing and publish acknowledgement tracking
//!
//! The event loop task routes every rumqttc event through
//! [`MessageHandler::route_mqtt_event`] and feeds the result to the
//! [`PublishTracker`], which decides when the single outstanding publish has
//! completed.

use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, PubAckReason, PubCompReason, PubRecReason};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Routing decisions for MQTT events
pub struct MessageHandler;

impl MessageHandler {
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => match connack.code {
                    ConnectReturnCode::Success => EventRoute::ConnectionAcknowledged,
                    code => EventRoute::ConnectionRefused(format!("{code:?}")),
                },
                Packet::PubAck(puback) => EventRoute::PubAck {
                    pkid: puback.pkid,
                    outcome: puback_outcome(&puback.reason),
                },
                Packet::PubRec(pubrec) => EventRoute::PubRec {
                    pkid: pubrec.pkid,
                    outcome: pubrec_outcome(&pubrec.reason),
                },
                Packet::PubComp(pubcomp) => EventRoute::PubComp {
                    pkid: pubcomp.pkid,
                    outcome: pubcomp_outcome(&pubcomp.reason),
                },
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload_len: publish.payload.len(),
                },
                Packet::Disconnect(_) => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Publish(pkid)) => EventRoute::PublishSent { pkid: *pkid },
            Event::Outgoing(outgoing) => EventRoute::OutgoingEvent(format!("{outgoing:?}")),
        }
    }
}

fn puback_outcome(reason: &PubAckReason) -> Result<(), String> {
    match reason {
        PubAckReason::Success | PubAckReason::NoMatchingSubscribers => Ok(()),
        other => Err(format!("PubAck {other:?}")),
    }
}

fn pubrec_outcome(reason: &PubRecReason) -> Result<(), String> {
    match reason {
        PubRecReason::Success | PubRecReason::NoMatchingSubscribers => Ok(()),
        other => Err(format!("PubRec {other:?}")),
    }
}

fn pubcomp_outcome(reason: &PubCompReason) -> Result<(), String> {
    match reason {
        PubCompReason::Success => Ok(()),
        other => Err(format!("PubComp {other:?}")),
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker accepted the connection
    ConnectionAcknowledged,
    /// Broker answered the connect with a failure code
    ConnectionRefused(String),
    /// A publish request was written; `pkid` is 0 for QoS 0
    PublishSent { pkid: u16 },
    PubAck { pkid: u16, outcome: Result<(), String> },
    PubRec { pkid: u16, outcome: Result<(), String> },
    PubComp { pkid: u16, outcome: Result<(), String> },
    /// Publish from the broker; the bridge never subscribes, so only logged
    MessageReceived { topic: String, payload_len: usize },
    /// Broker sent a Disconnect packet
    Disconnected,
    /// PingResp, SubAck and other packets with no effect on the bridge
    InfrastructureEvent(String),
    /// Outgoing packets other than publishes
    OutgoingEvent(String),
}

/// Acknowledgement state of the one publish a client may have outstanding.
///
/// rumqttc reports an outgoing publish by packet id only, so the first
/// `PublishSent` after [`begin`](Self::begin) is taken as ours. QoS 0
/// completes when the packet is written, QoS 1 on PubAck, QoS 2 on PubComp
/// (or on a failed PubRec).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PublishTracker {
    #[default]
    Idle,
    /// Request queued in the client, not yet written
    Requested { qos: QoS },
    /// Written with `pkid`, waiting for the broker
    AwaitingAck { pkid: u16, qos: QoS },
}

impl PublishTracker {
    pub fn is_idle(&self) -> bool {
        matches!(self, PublishTracker::Idle)
    }

    /// Start tracking a new request. Fails if one is already outstanding.
    pub fn begin(&mut self, qos: QoS) -> Result<(), String> {
        if !self.is_idle() {
            return Err(format!("publish already outstanding: {self:?}"));
        }
        *self = PublishTracker::Requested { qos };
        Ok(())
    }

    /// Forget the outstanding request without reporting it
    pub fn cancel(&mut self) {
        *self = PublishTracker::Idle;
    }

    /// Apply one routed event; returns the outcome once the request completes
    pub fn on_route(&mut self, route: &EventRoute) -> Option<Result<(), String>> {
        match (self.clone(), route) {
            (PublishTracker::Requested { qos }, EventRoute::PublishSent { pkid }) => {
                if qos == QoS::AtMostOnce {
                    *self = PublishTracker::Idle;
                    Some(Ok(()))
                } else {
                    *self = PublishTracker::AwaitingAck { pkid: *pkid, qos };
                    None
                }
            }
            (
                PublishTracker::AwaitingAck {
                    pkid,
                    qos: QoS::AtLeastOnce,
                },
                EventRoute::PubAck { pkid: acked, outcome },
            ) if pkid == *acked => {
                *self = PublishTracker::Idle;
                Some(outcome.clone())
            }
            (
                PublishTracker::AwaitingAck {
                    pkid,
                    qos: QoS::ExactlyOnce,
                },
                EventRoute::PubRec {
                    pkid: received,
                    outcome: Err(e),
                },
            ) if pkid == *received => {
                *self = PublishTracker::Idle;
                Some(Err(e.clone()))
            }
            (
                PublishTracker::AwaitingAck {
                    pkid,
                    qos: QoS::ExactlyOnce,
                },
                EventRoute::PubComp {
                    pkid: completed,
                    outcome,
                },
            ) if pkid == *completed => {
                *self = PublishTracker::Idle;
                Some(outcome.clone())
            }
            _ => None,
        }
    }
}
