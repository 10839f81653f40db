//! Ordered pending-message buffer
//!
//! FIFO of decoded messages awaiting publication. The Frame Decoder appends to
//! the tail, the Publish Pump takes from the head and puts a failed message
//! back at the head so it is retried before anything enqueued after it.

use crate::config::{BufferSection, OverflowPolicy};
use std::collections::VecDeque;

/// Result of appending a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended without loss
    Queued,
    /// Appended after discarding the oldest pending message
    DroppedOldest(String),
    /// Buffer full; the new message was discarded
    DroppedNewest,
}

/// Memory-only FIFO with optional capacity
#[derive(Debug, Clone, Default)]
pub struct MessageBuffer {
    queue: VecDeque<String>,
    capacity: Option<usize>,
    overflow: OverflowPolicy,
}

impl MessageBuffer {
    /// Unbounded buffer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &BufferSection) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: config.capacity,
            overflow: config.overflow,
        }
    }

    /// Append to the tail, applying the overflow policy when full
    pub fn enqueue(&mut self, message: String) -> EnqueueOutcome {
        let full = self
            .capacity
            .is_some_and(|capacity| self.queue.len() >= capacity);
        if !full {
            self.queue.push_back(message);
            return EnqueueOutcome::Queued;
        }

        match self.overflow {
            OverflowPolicy::DropOldest => {
                let dropped = self.queue.pop_front();
                self.queue.push_back(message);
                match dropped {
                    Some(dropped) => EnqueueOutcome::DroppedOldest(dropped),
                    None => EnqueueOutcome::Queued,
                }
            }
            OverflowPolicy::DropNewest => EnqueueOutcome::DroppedNewest,
        }
    }

    /// Remove the head for delivery
    pub fn pop_front(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Return a message whose delivery failed to the head; never drops
    pub fn requeue_front(&mut self, message: String) {
        self.queue.push_front(message);
    }

    pub fn front(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Snapshot of the backlog in delivery order
    pub fn to_vec(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }
}
