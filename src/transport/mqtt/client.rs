//! rumqttc-backed broker connector
//!
//! Each [`MqttBrokerConnector::connect`] call builds a fresh client and spawns
//! a task that polls its event loop, reports connection changes and publish
//! completions to the bridge, and retries failed connections on the
//! configured schedule until it is told to stop or gives up.

use super::connection::{configure_mqtt_options, BrokerEndpoint, ConnectionState, MqttError, ReconnectConfig};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageHandler, PublishTracker};
use crate::bridge::{BridgeEvent, BrokerEvent, Epoch, EventSender};
use crate::config::BrokerSection;
use crate::transport::{BrokerConnector, BrokerHandle};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use rumqttc::Outgoing;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Capacity of the rumqttc request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Upper bound on waiting for the Disconnect packet to be written on close
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Creates one rumqttc client per broker epoch
#[derive(Debug, Clone)]
pub struct MqttBrokerConnector {
    endpoint: BrokerEndpoint,
    config: BrokerSection,
    reconnect_config: ReconnectConfig,
}

impl MqttBrokerConnector {
    pub fn new(config: &BrokerSection) -> Result<Self, MqttError> {
        let endpoint = BrokerEndpoint::parse(&config.normalized_address())?;
        let connector = Self {
            endpoint,
            config: config.clone(),
            reconnect_config: ReconnectConfig::from_section(config),
        };

        match connector.retry_window() {
            Some(window) => debug!(
                max_attempts = ?connector.reconnect_config.max_attempts,
                retry_window_ms = window.as_millis() as u64,
                "MQTT client closes after its reconnection attempts"
            ),
            None => debug!("MQTT client retries without limit"),
        }

        Ok(connector)
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    /// Total backoff one client spends before it reports `Closed`; None when
    /// retries are unlimited
    pub fn retry_window(&self) -> Option<Duration> {
        self.reconnect_config
            .calculate_max_total_time()
            .map(Duration::from_millis)
    }
}

impl BrokerConnector for MqttBrokerConnector {
    type Handle = MqttBrokerHandle;

    fn connect(&self, epoch: Epoch, events: EventSender) -> MqttBrokerHandle {
        let mqtt_options = configure_mqtt_options(&self.endpoint, &self.config);
        debug!(epoch, client_id = %mqtt_options.client_id(), "Creating MQTT client");
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tracker = Arc::new(Mutex::new(PublishTracker::default()));

        let task = EventLoopTask {
            epoch,
            events,
            tracker: tracker.clone(),
            state_tx,
            reconnect_config: self.reconnect_config.clone(),
            shutdown_rx,
            attempts: 0,
        };
        let task_handle = tokio::spawn(task.run(event_loop));

        MqttBrokerHandle {
            client,
            tracker,
            state_rx,
            shutdown_tx,
            task_handle,
        }
    }
}

/// Live rumqttc client for one broker epoch
pub struct MqttBrokerHandle {
    client: AsyncClient,
    tracker: Arc<Mutex<PublishTracker>>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    task_handle: JoinHandle<()>,
}

impl MqttBrokerHandle {
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }
}

impl BrokerHandle for MqttBrokerHandle {
    fn publish(&mut self, topic: &str, payload: &str, qos: QoS) -> Result<(), MqttError> {
        let state = self.connection_state();
        if !HealthMonitor::can_publish(&state) {
            return Err(MqttError::NotConnected { state });
        }

        let mut tracker = self.tracker.lock().map_err(|_| MqttError::Closed)?;
        tracker
            .begin(qos)
            .map_err(|e| MqttError::PublishFailed(e.into()))?;

        if let Err(e) = self.client.try_publish(topic, qos, false, payload.to_string()) {
            tracker.cancel();
            return Err(MqttError::PublishFailed(Box::new(e)));
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.task_handle.is_finished() {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "Could not queue MQTT disconnect");
        }
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for MqttBrokerHandle {
    fn drop(&mut self) {
        // The task flushes any queued Disconnect and exits on its own
        let _ = self.shutdown_tx.send(true);
    }
}

/// Owns the event loop of one client
struct EventLoopTask {
    epoch: Epoch,
    events: EventSender,
    tracker: Arc<Mutex<PublishTracker>>,
    state_tx: watch::Sender<ConnectionState>,
    reconnect_config: ReconnectConfig,
    shutdown_rx: watch::Receiver<bool>,
    attempts: u32,
}

impl EventLoopTask {
    async fn run(mut self, mut event_loop: EventLoop) {
        debug!(epoch = self.epoch, "MQTT event loop started");

        loop {
            let polled = tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        Self::flush_disconnect(&mut event_loop).await;
                        break;
                    }
                    continue;
                }
                polled = event_loop.poll() => polled,
            };

            let keep_running = match polled {
                Ok(event) => self.handle_event(&event).await,
                Err(e) => self.handle_connection_error(e).await,
            };
            if !keep_running {
                break;
            }
        }

        debug!(epoch = self.epoch, "MQTT event loop stopped");
    }

    /// Keep polling until the Disconnect packet is written or the grace
    /// period ends
    async fn flush_disconnect(event_loop: &mut EventLoop) {
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("MQTT disconnect not flushed before grace period ended");
        }
    }

    /// Returns false once the bridge is gone
    async fn report(&self, event: BrokerEvent) -> bool {
        self.events
            .send(BridgeEvent::broker(self.epoch, event))
            .await
            .is_ok()
    }

    fn transition(&self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(event);
        let previous = self.state_tx.send_replace(next.clone());
        HealthMonitor::log_state_transition(&previous, &next);
    }

    async fn handle_event(&mut self, event: &Event) -> bool {
        let route = MessageHandler::route_mqtt_event(event);

        let completion = match self.tracker.lock() {
            Ok(mut tracker) => tracker.on_route(&route),
            Err(_) => None,
        };
        if let Some(result) = completion {
            if !self.report(BrokerEvent::PublishCompleted(result)).await {
                return false;
            }
        }

        match route {
            EventRoute::ConnectionAcknowledged => {
                self.attempts = 0;
                self.transition(ConnectionEvent::ConnAckReceived);
                self.report(BrokerEvent::Connected).await
            }
            EventRoute::ConnectionRefused(reason) => {
                self.transition(ConnectionEvent::ConnAckRefused(reason.clone()));
                self.report(BrokerEvent::Error(format!("Connection refused: {reason}")))
                    .await
            }
            EventRoute::Disconnected => {
                self.transition(ConnectionEvent::DisconnectedByBroker);
                self.report(BrokerEvent::Offline).await
            }
            EventRoute::MessageReceived { topic, payload_len } => {
                debug!(%topic, payload_len, "Ignoring unexpected MQTT publish");
                true
            }
            EventRoute::PublishSent { pkid } => {
                trace!(pkid, "MQTT publish written");
                true
            }
            EventRoute::PubAck { pkid, .. }
            | EventRoute::PubRec { pkid, .. }
            | EventRoute::PubComp { pkid, .. } => {
                trace!(pkid, "MQTT acknowledgement received");
                true
            }
            EventRoute::InfrastructureEvent(packet) | EventRoute::OutgoingEvent(packet) => {
                trace!(target: "mqtt_transport", "MQTT event: {}", packet);
                true
            }
        }
    }

    async fn handle_connection_error(&mut self, error: rumqttc::v5::ConnectionError) -> bool {
        let reason = error.to_string();
        self.transition(ConnectionEvent::NetworkError(reason.clone()));

        if !self.report(BrokerEvent::Error(reason)).await {
            return false;
        }
        if !self.report(BrokerEvent::Offline).await {
            return false;
        }

        let decision = HealthMonitor::should_attempt_reconnection(
            self.attempts,
            &self.reconnect_config,
            *self.shutdown_rx.borrow(),
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay } => {
                self.attempts = attempt;
                self.transition(ConnectionEvent::ReconnectionStarted(attempt));

                let max_display = self
                    .reconnect_config
                    .max_attempts
                    .map_or("unlimited".to_string(), |max| max.to_string());
                info!(
                    epoch = self.epoch,
                    "Attempting MQTT reconnection {}/{} after {}ms delay",
                    attempt,
                    max_display,
                    delay.as_millis()
                );

                if !self.report(BrokerEvent::Reconnecting { attempt }).await {
                    return false;
                }
                Self::interruptible_sleep(self.shutdown_rx.clone(), delay).await
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown requested, stopping MQTT reconnection");
                false
            }
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                let reason = format!("Max reconnection attempts ({}) exceeded", self.attempts);
                self.transition(ConnectionEvent::PermanentFailure(reason));
                if let Ok(mut tracker) = self.tracker.lock() {
                    tracker.cancel();
                }
                if !self.report(BrokerEvent::Closed).await {
                    warn!("Bridge gone before MQTT close could be reported");
                }
                false
            }
        }
    }

    /// Returns true if the delay elapsed, false if shutdown was requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl std::fmt::Debug for MqttBrokerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBrokerHandle")
            .field("state", &*self.state_rx.borrow())
            .field("finished", &self.task_handle.is_finished())
            .finish()
    }
}
