//! Frame intake and publish pump
//!
//! At most one publish request is outstanding at any time. The head of the
//! buffer is only removed for good once the broker acknowledges it.

use super::buffer::EnqueueOutcome;
use super::events::Epoch;
use super::state::PumpLock;
use super::Bridge;
use crate::transport::{BrokerConnector, BrokerHandle, SourceConnector};
use tracing::{debug, trace, warn};

impl<S, B> Bridge<S, B>
where
    S: SourceConnector,
    B: BrokerConnector,
{
    /// Decode one socket chunk, queue every complete message and kick the pump
    pub fn ingest(&mut self, chunk: &[u8]) {
        let decoded = self.state.decoder.decode(chunk);
        trace!(
            bytes = chunk.len(),
            messages = decoded.messages.len(),
            buffered = self.state.decoder.buffered_len(),
            "Decoded chunk"
        );

        self.metrics.frames_decoded(decoded.messages.len());
        if decoded.discarded > 0 {
            self.metrics.frames_discarded(decoded.discarded);
            debug!(count = decoded.discarded, "Discarded frames without payload");
        }

        for message in decoded.messages {
            self.enqueue(message);
        }

        if !self.state.pending.is_empty() && self.state.broker.is_some() {
            self.drain();
        }
    }

    /// Append a decoded message to the tail of the buffer
    pub fn enqueue(&mut self, message: String) {
        debug!(message = %message, "Message queued");

        match self.state.pending.enqueue(message) {
            EnqueueOutcome::Queued => self.metrics.message_enqueued(),
            EnqueueOutcome::DroppedOldest(dropped) => {
                warn!(
                    dropped = %dropped,
                    capacity = ?self.state.pending.capacity(),
                    "Message buffer full, dropped oldest message"
                );
                self.metrics.message_enqueued();
                self.metrics.message_dropped();
            }
            EnqueueOutcome::DroppedNewest => {
                warn!(
                    capacity = ?self.state.pending.capacity(),
                    "Message buffer full, dropped incoming message"
                );
                self.metrics.message_dropped();
            }
        }

        self.metrics.set_backlog(self.state.pending.len());
    }

    /// Publish the head of the buffer if nothing is in flight and the broker
    /// is online. Further messages follow from the acknowledgement.
    pub fn drain(&mut self) {
        if self.state.pump.is_locked() {
            debug!(pump = ?self.state.pump, "Processing message buffer already in progress");
            return;
        }
        if !self.state.broker_online {
            return;
        }
        let Some(slot) = self.state.broker.as_mut() else {
            return;
        };
        let Some(message) = self.state.pending.pop_front() else {
            return;
        };

        let epoch = slot.epoch;
        self.metrics.publish_attempted();
        match slot
            .handle
            .publish(&self.state.active_topic, &message, self.qos)
        {
            Ok(()) => {
                trace!(epoch, message = %message, "Publish request submitted");
                self.state.pump = PumpLock::InFlight { message, epoch };
            }
            Err(e) => {
                warn!(error = %e, "Publish request rejected, message returned to buffer");
                self.metrics.publish_failed();
                self.state.pending.requeue_front(message);
            }
        }

        self.metrics.set_backlog(self.state.pending.len());
    }

    pub(super) fn on_publish_completed(&mut self, epoch: Epoch, result: Result<(), String>) {
        match std::mem::take(&mut self.state.pump) {
            PumpLock::InFlight {
                message,
                epoch: in_flight,
            } if in_flight == epoch => match result {
                Ok(()) => {
                    debug!(
                        message = %message,
                        topic = %self.state.active_topic,
                        "Message published"
                    );
                    self.metrics.message_published();
                    self.drain();
                }
                Err(e) => {
                    warn!(error = %e, message = %message, "Publish failed, message returned to buffer");
                    self.metrics.publish_failed();
                    self.state.pending.requeue_front(message);
                    self.metrics.set_backlog(self.state.pending.len());
                }
            },
            other => {
                debug!(epoch, pump = ?other, "Ignoring publish completion with no matching request");
                self.state.pump = other;
            }
        }
    }
}
