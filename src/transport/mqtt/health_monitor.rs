//! Reconnection decisions and connection state transitions
//!
//! Pure functions used by the client task; the task itself decides when to
//! sleep and when to report events to the bridge.

use super::connection::{ConnectionState, ReconnectConfig};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reconnection and state transition logic for one broker client
pub struct HealthMonitor;

impl HealthMonitor {
    /// Decide whether the client retries after `current_attempts` failed
    /// attempts. Unlimited when `max_attempts` is None.
    pub fn should_attempt_reconnection(
        current_attempts: u32,
        config: &ReconnectConfig,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }

        if let Some(max_attempts) = config.max_attempts {
            if current_attempts >= max_attempts {
                return ReconnectionDecision::AbortMaxAttemptsExceeded;
            }
        }

        let attempt = current_attempts + 1;
        ReconnectionDecision::Proceed {
            attempt,
            delay: Duration::from_millis(config.calculate_backoff_delay(attempt)),
        }
    }

    /// Next client state after a connection event
    pub fn determine_next_state(event: ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnAckReceived => ConnectionState::Connected,
            ConnectionEvent::ConnAckRefused(reason) => ConnectionState::Disconnected(reason),
            ConnectionEvent::DisconnectedByBroker => {
                ConnectionState::Disconnected("Broker disconnected".to_string())
            }
            ConnectionEvent::NetworkError(error) => ConnectionState::Disconnected(error),
            ConnectionEvent::ReconnectionStarted(attempt) => ConnectionState::Reconnecting(attempt),
            ConnectionEvent::PermanentFailure(reason) => {
                ConnectionState::PermanentlyDisconnected(reason)
            }
        }
    }

    /// Publish requests are only accepted while connected
    pub fn can_publish(state: &ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    pub fn log_state_transition(from: &ConnectionState, to: &ConnectionState) {
        match (from, to) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("MQTT connection established");
            }
            (ConnectionState::Reconnecting(attempt), ConnectionState::Connected) => {
                info!(attempt, "MQTT reconnection successful");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected(reason)) => {
                warn!(%reason, "MQTT connection lost");
            }
            (_, ConnectionState::Reconnecting(attempt)) => {
                info!(attempt, "Starting MQTT reconnection attempt");
            }
            (_, ConnectionState::PermanentlyDisconnected(reason)) => {
                error!(%reason, "MQTT connection permanently failed");
            }
            _ => {
                debug!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }

    /// Reject schedules that would spin or never retry
    pub fn validate_connection_config(config: &ReconnectConfig) -> Result<(), String> {
        if config.max_attempts == Some(0) {
            return Err("max_reconnect_attempts must be greater than 0 or unset".to_string());
        }

        if config.sustained_delay == 0 {
            return Err("reconnect_delay_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, PartialEq)]
pub enum ReconnectionDecision {
    /// Wait `delay`, then poll the event loop again
    Proceed { attempt: u32, delay: Duration },
    AbortShutdownRequested,
    AbortMaxAttemptsExceeded,
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    ConnAckReceived,
    /// Broker answered the connect with a failure reason
    ConnAckRefused(String),
    DisconnectedByBroker,
    /// Network or protocol error from the event loop
    NetworkError(String),
    ReconnectionStarted(u32),
    /// No more retries
    PermanentFailure(String),
}
