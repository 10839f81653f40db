//! Pure connection configuration for the MQTT broker client
//!
//! Broker address normalization, endpoint parsing, client options and the
//! reconnection schedule. Nothing in here performs I/O.

use crate::config::BrokerSection;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Scheme prefixed to bare broker addresses
pub const DEFAULT_SCHEME: &str = "mqtt";

/// Port appended to broker addresses that carry none
pub const DEFAULT_PORT: u16 = 1883;

/// Port appended to `mqtts://` addresses that carry none
pub const DEFAULT_TLS_PORT: u16 = 8883;

const TLS_SCHEME: &str = "mqtts";

/// Connection state of one broker client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Waiting for the broker's acknowledgement
    Connecting,
    Connected,
    /// Connection lost with reason
    Disconnected(String),
    /// Waiting before reconnection attempt N
    Reconnecting(u32),
    /// Reconnection attempts exhausted; the client stops
    PermanentlyDisconnected(String),
}

/// Reconnection schedule of one broker client
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Delays in milliseconds for the first attempts
    pub backoff_pattern: Vec<u64>,
    /// Delay in milliseconds once the pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_pattern: Vec::new(),
            sustained_delay: 1000,
        }
    }
}

impl ReconnectConfig {
    pub fn from_section(section: &BrokerSection) -> Self {
        Self {
            max_attempts: section.max_reconnect_attempts,
            backoff_pattern: section.reconnect_backoff_ms.clone(),
            sustained_delay: section.reconnect_delay_ms,
        }
    }

    /// Delay in milliseconds before the given 1-based attempt
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }

    /// Longest time the client keeps retrying before it gives up.
    /// None if retries are unlimited.
    pub fn calculate_max_total_time(&self) -> Option<u64> {
        self.max_attempts.map(|max_attempts| {
            (1..=max_attempts)
                .map(|attempt| self.calculate_backoff_delay(attempt))
                .sum()
        })
    }
}

/// Broker adapter errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("MQTT client closed")]
    Closed,
}

/// Host, port and transport security of a broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerEndpoint {
    /// Parse a normalized broker URL. Accepts `mqtt`, `tcp` and `mqtts`.
    pub fn parse(address: &str) -> Result<Self, MqttError> {
        let url = Url::parse(address).map_err(|_| MqttError::InvalidBrokerUrl(address.to_string()))?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            TLS_SCHEME => true,
            _ => return Err(MqttError::InvalidBrokerUrl(address.to_string())),
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| MqttError::InvalidBrokerUrl(address.to_string()))?;
        let port = url.port().unwrap_or(default_port(tls));

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }
}

/// Complete a broker address: prefix `mqtt://` when no scheme is given and
/// append `:1883` (`:8883` for `mqtts://`) when it does not end in a port
/// number.
pub fn normalize_broker_address(address: &str) -> String {
    let address = address.trim();

    let mut normalized = if has_scheme(address) {
        address.to_string()
    } else {
        format!("{DEFAULT_SCHEME}://{address}")
    };

    if !has_port_suffix(&normalized) {
        let tls = normalized
            .split_once("://")
            .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case(TLS_SCHEME));
        normalized.push(':');
        normalized.push_str(&default_port(tls).to_string());
    }

    normalized
}

fn default_port(tls: bool) -> u16 {
    if tls {
        DEFAULT_TLS_PORT
    } else {
        DEFAULT_PORT
    }
}

fn has_scheme(address: &str) -> bool {
    let Some((scheme, _)) = address.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn has_port_suffix(address: &str) -> bool {
    let digits = address
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    digits > 0 && address[..address.len() - digits].ends_with(':')
}

/// Build client options for a fresh connection.
///
/// Every call yields a new client id so a recreated client never collides
/// with a session the broker still holds for its predecessor.
pub fn configure_mqtt_options(endpoint: &BrokerEndpoint, config: &BrokerSection) -> MqttOptions {
    let client_id = format!("socket-queue-bridge-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let mut mqtt_options = MqttOptions::new(client_id, endpoint.host.clone(), endpoint.port);

    if endpoint.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(username, password);
        }
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_start(true);

    mqtt_options
}
