//! Bridging engine
//!
//! The [`Bridge`] owns the link state and is driven by a single task: every
//! heartbeat tick, socket chunk, connection event and publish acknowledgement
//! is handled one at a time, so the only mutual exclusion needed is the
//! publish pump lock.
//!
//! # Architecture
//!
//! - [`buffer`] - ordered pending-message FIFO
//! - [`state`] - link state record and pump lock
//! - [`events`] - events reported by the transport adapters
//! - `supervisor` - heartbeat and connection event handling
//! - `pump` - frame intake and serialized publishing
//!
//! # Usage
//!
//! ```rust,no_run
//! use socket_queue_bridge::bridge::Bridge;
//! use socket_queue_bridge::config::BridgeConfig;
//! use socket_queue_bridge::transport::{mqtt::MqttBrokerConnector, tcp::TcpSourceConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let source = TcpSourceConnector::new(&config.source);
//! let broker = MqttBrokerConnector::new(&config.broker)?;
//! let bridge = Bridge::new(config, source, broker)?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let stats = bridge.run(shutdown_rx).await;
//! println!("published {} messages", stats.messages_published);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod events;
mod pump;
pub mod state;
mod supervisor;

pub use buffer::{EnqueueOutcome, MessageBuffer};
pub use events::{event_channel, BridgeEvent, BrokerEvent, Epoch, EventReceiver, EventSender, SourceEvent};
pub use state::{BrokerLink, LinkState, PumpLock};

use crate::config::{BridgeConfig, ConfigError};
use crate::observability::metrics::{MetricsCollector, MetricsSnapshot};
use crate::transport::{BrokerConnector, BrokerHandle, SourceConnector, SourceHandle};
use rumqttc::v5::mqttbytes::QoS;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Period used for the stats timer when stats logging is disabled; never fires
/// in practice because its branch is switched off
const IDLE_STATS_PERIOD: Duration = Duration::from_secs(3600);

/// TCP-to-MQTT bridge: connection supervisor, frame decoder and publish pump
pub struct Bridge<S, B>
where
    S: SourceConnector,
    B: BrokerConnector,
{
    config: BridgeConfig,
    qos: QoS,
    source_connector: S,
    broker_connector: B,
    state: LinkState<S::Handle, B::Handle>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    metrics: MetricsCollector,
}

impl<S, B> Bridge<S, B>
where
    S: SourceConnector,
    B: BrokerConnector,
{
    /// Create a bridge with empty buffers and both connections absent
    pub fn new(config: BridgeConfig, source_connector: S, broker_connector: B) -> Result<Self, ConfigError> {
        let qos = config.broker.qos_level()?;
        let state = LinkState::new(&config);
        let (events_tx, events_rx) = event_channel();

        Ok(Self {
            config,
            qos,
            source_connector,
            broker_connector,
            state,
            events_tx,
            events_rx,
            metrics: MetricsCollector::new(),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> &LinkState<S::Handle, B::Handle> {
        &self.state
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn source_connector(&self) -> &S {
        &self.source_connector
    }

    pub fn broker_connector(&self) -> &B {
        &self.broker_connector
    }

    /// Apply one event reported by a transport adapter
    pub fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Source { epoch, event } => self.on_source_event(epoch, event),
            BridgeEvent::Broker { epoch, event } => self.on_broker_event(epoch, event),
        }
    }

    /// Drive the bridge until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first heartbeat fires immediately, so both connections are attempted
    /// at startup. Returns the final metrics snapshot.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> MetricsSnapshot {
        info!(
            source = %format!("{}:{}", self.config.source.host, self.config.source.port),
            broker = %self.config.broker.normalized_address(),
            topic = %self.config.broker.topic,
            framing = ?self.config.source.framing,
            "Bridge started"
        );

        let mut heartbeat = interval(self.config.supervisor.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stats_period = self.config.supervisor.stats_interval();
        let stats_enabled = stats_period.is_some();
        let stats_period = stats_period.unwrap_or(IDLE_STATS_PERIOD);
        let mut stats = interval_at(Instant::now() + stats_period, stats_period);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping bridge");
                        break;
                    }
                }
                _ = heartbeat.tick() => self.heartbeat(),
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = stats.tick(), if stats_enabled => self.log_stats(),
            }
        }

        self.shutdown()
    }

    /// Close both connections and report what is left in memory
    pub fn shutdown(&mut self) -> MetricsSnapshot {
        if let Some(mut slot) = self.state.source.take() {
            debug!(epoch = slot.epoch, "Closing source connection");
            slot.handle.close();
        }
        self.state.decoder.reset();

        if let Some(mut slot) = self.state.broker.take() {
            debug!(epoch = slot.epoch, "Closing MQTT client");
            slot.handle.close();
        }
        self.state.broker_online = false;

        if let PumpLock::InFlight { message, .. } = std::mem::take(&mut self.state.pump) {
            self.state.pending.requeue_front(message);
        }

        let backlog = self.state.pending.len();
        self.metrics.set_backlog(backlog);
        if backlog > 0 {
            warn!(backlog, "Discarding undelivered messages on shutdown");
        }

        let snapshot = self.metrics.snapshot();
        info!(
            published = snapshot.messages_published,
            decoded = snapshot.frames_decoded,
            uptime_secs = snapshot.uptime_secs,
            "Bridge stopped"
        );
        snapshot
    }

    fn log_stats(&self) {
        let snapshot = self.metrics.snapshot();
        info!(
            backlog = snapshot.backlog,
            decoded = snapshot.frames_decoded,
            discarded = snapshot.frames_discarded,
            dropped = snapshot.messages_dropped,
            published = snapshot.messages_published,
            publish_failures = snapshot.publish_failures,
            source_connected = self.state.source_connected(),
            broker_link = ?self.state.broker_link(),
            "Bridge statistics"
        );
    }
}
