//! Bridge metrics
//!
//! Atomic counters for framing, buffering, publishing and both connection
//! supervisors. The bridge task is the only writer; snapshots are taken for
//! the periodic stats log line and on shutdown.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Thread-safe metrics collector using atomics
#[derive(Debug)]
pub struct MetricsCollector {
    // Framing
    frames_decoded: AtomicU64,
    frames_discarded: AtomicU64,

    // Buffer
    messages_enqueued: AtomicU64,
    messages_dropped: AtomicU64,
    backlog: AtomicU64,

    // Publish pump
    publish_attempts: AtomicU64,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,

    // Source link
    source_connection_attempts: AtomicU64,
    source_connections_established: AtomicU64,
    source_connections_lost: AtomicU64,

    // Broker link
    broker_connection_attempts: AtomicU64,
    broker_connections_established: AtomicU64,
    broker_connections_closed: AtomicU64,

    started_at: DateTime<Utc>,
    last_published_at: Mutex<Option<DateTime<Utc>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            frames_decoded: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
            messages_enqueued: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            backlog: AtomicU64::new(0),
            publish_attempts: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            source_connection_attempts: AtomicU64::new(0),
            source_connections_established: AtomicU64::new(0),
            source_connections_lost: AtomicU64::new(0),
            broker_connection_attempts: AtomicU64::new(0),
            broker_connections_established: AtomicU64::new(0),
            broker_connections_closed: AtomicU64::new(0),
            started_at: Utc::now(),
            last_published_at: Mutex::new(None),
        }
    }

    // Framing metrics
    pub fn frames_decoded(&self, count: usize) {
        self.frames_decoded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn frames_discarded(&self, count: usize) {
        self.frames_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    // Buffer metrics
    pub fn message_enqueued(&self) {
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_backlog(&self, len: usize) {
        self.backlog.store(len as u64, Ordering::Relaxed);
    }

    // Publish metrics
    pub fn publish_attempted(&self) {
        self.publish_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_published_at.lock() {
            *last = Some(Utc::now());
        }
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Source connection metrics
    pub fn source_connection_attempt(&self) {
        self.source_connection_attempts
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn source_connection_established(&self) {
        self.source_connections_established
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn source_connection_lost(&self) {
        self.source_connections_lost.fetch_add(1, Ordering::Relaxed);
    }

    // Broker connection metrics
    pub fn broker_connection_attempt(&self) {
        self.broker_connection_attempts
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn broker_connection_established(&self) {
        self.broker_connections_established
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn broker_connection_closed(&self) {
        self.broker_connections_closed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_published_at = self
            .last_published_at
            .lock()
            .map(|last| *last)
            .unwrap_or(None);

        MetricsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            backlog: self.backlog.load(Ordering::Relaxed),
            publish_attempts: self.publish_attempts.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            source_connection_attempts: self.source_connection_attempts.load(Ordering::Relaxed),
            source_connections_established: self
                .source_connections_established
                .load(Ordering::Relaxed),
            source_connections_lost: self.source_connections_lost.load(Ordering::Relaxed),
            broker_connection_attempts: self.broker_connection_attempts.load(Ordering::Relaxed),
            broker_connections_established: self
                .broker_connections_established
                .load(Ordering::Relaxed),
            broker_connections_closed: self.broker_connections_closed.load(Ordering::Relaxed),
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            started_at: self.started_at,
            last_published_at,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub frames_decoded: u64,
    pub frames_discarded: u64,
    pub messages_enqueued: u64,
    pub messages_dropped: u64,
    pub backlog: u64,
    pub publish_attempts: u64,
    pub messages_published: u64,
    pub publish_failures: u64,
    pub source_connection_attempts: u64,
    pub source_connections_established: u64,
    pub source_connections_lost: u64,
    pub broker_connection_attempts: u64,
    pub broker_connections_established: u64,
    pub broker_connections_closed: u64,
    pub uptime_secs: u64,
    pub started_at: DateTime<Utc>,
    pub last_published_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_collector_is_zeroed() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.frames_decoded, 0);
        assert_eq!(snapshot.messages_published, 0);
        assert_eq!(snapshot.backlog, 0);
        assert!(snapshot.last_published_at.is_none());
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = MetricsCollector::new();
        metrics.frames_decoded(3);
        metrics.frames_discarded(1);
        metrics.message_enqueued();
        metrics.message_enqueued();
        metrics.message_dropped();
        metrics.publish_attempted();
        metrics.publish_failed();
        metrics.publish_attempted();
        metrics.message_published();
        metrics.set_backlog(7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_decoded, 3);
        assert_eq!(snapshot.frames_discarded, 1);
        assert_eq!(snapshot.messages_enqueued, 2);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.publish_attempts, 2);
        assert_eq!(snapshot.publish_failures, 1);
        assert_eq!(snapshot.messages_published, 1);
        assert_eq!(snapshot.backlog, 7);
        assert!(snapshot.last_published_at.is_some());
    }

    #[test]
    fn test_connection_counters() {
        let metrics = MetricsCollector::new();
        metrics.source_connection_attempt();
        metrics.source_connection_established();
        metrics.source_connection_lost();
        metrics.broker_connection_attempt();
        metrics.broker_connection_attempt();
        metrics.broker_connection_established();
        metrics.broker_connection_closed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.source_connection_attempts, 1);
        assert_eq!(snapshot.source_connections_established, 1);
        assert_eq!(snapshot.source_connections_lost, 1);
        assert_eq!(snapshot.broker_connection_attempts, 2);
        assert_eq!(snapshot.broker_connections_established, 1);
        assert_eq!(snapshot.broker_connections_closed, 1);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = MetricsCollector::new().snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["messages_published"], 0);
        assert!(json["started_at"].is_string());
    }
}
