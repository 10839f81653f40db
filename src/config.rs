//! Bridge configuration
//!
//! Configuration is immutable once the bridge starts. Every field has a
//! default; an optional TOML file is loaded first and command-line overrides
//! are applied on top exactly once (see [`crate::cli`]).

use crate::framing::FramingMode;
use crate::transport::mqtt::{normalize_broker_address, HealthMonitor, ReconnectConfig};
use rumqttc::v5::mqttbytes::QoS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub source: SourceSection,
    pub broker: BrokerSection,
    pub buffer: BufferSection,
    pub supervisor: SupervisorSection,
    pub logging: LoggingSection,
}

/// TCP data source (PLC or sensor)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSection {
    /// Source hostname or address
    pub host: String,
    /// Source port number
    pub port: u16,
    /// Frame delimiting strategy for the raw stream
    pub framing: FramingMode,
    /// Idle period after which a socket timeout is logged
    pub idle_timeout_ms: u64,
    /// Upper bound for a single connect attempt
    pub connect_timeout_ms: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1000,
            framing: FramingMode::Binary,
            idle_timeout_ms: 5000,
            connect_timeout_ms: 5000,
        }
    }
}

impl SourceSection {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// MQTT broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerSection {
    /// Broker address: bare host, host:port or full URL
    pub address: String,
    /// Topic every decoded message is published to
    pub topic: String,
    /// Quality-of-service level passed through to the broker (0, 1 or 2)
    pub qos: u8,
    /// MQTT keep alive in seconds
    pub keep_alive_secs: u64,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Delays used for the first reconnection attempts of one client
    pub reconnect_backoff_ms: Vec<u64>,
    /// Delay used once the backoff pattern is exhausted
    pub reconnect_delay_ms: u64,
    /// Attempts before the client gives up and the handle is closed (None = unlimited)
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            topic: "sensor/flock".to_string(),
            qos: 0,
            keep_alive_secs: 60,
            username_env: None,
            password_env: None,
            reconnect_backoff_ms: Vec::new(),
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: None,
        }
    }
}

impl BrokerSection {
    /// Publish QoS as understood by the MQTT client
    pub fn qos_level(&self) -> Result<QoS, ConfigError> {
        qos_from_level(self.qos)
    }

    /// Broker address with default scheme and port applied
    pub fn normalized_address(&self) -> String {
        normalize_broker_address(&self.address)
    }
}

/// What to discard when a bounded buffer is full
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the head of the queue to make room for the new message
    #[default]
    DropOldest,
    /// Discard the incoming message
    DropNewest,
}

/// Pending message buffer section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferSection {
    /// Maximum number of pending messages (None = unbounded)
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

/// Connection supervisor section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorSection {
    /// Period of the reconnect heartbeat
    pub heartbeat_interval_ms: u64,
    /// Period of the stats log line (0 = disabled)
    pub stats_interval_secs: u64,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            stats_interval_secs: 60,
        }
    }
}

impl SupervisorSection {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

/// Console and file logging section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// Only warnings and errors
    pub quiet: bool,
    /// Verbosity level (1 = debug, 2+ = trace)
    pub verbose: u8,
    /// Mirror log output to this file
    pub file: Option<PathBuf>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file; missing fields take their defaults
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check the whole configuration for values the bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Source host must not be empty".to_string(),
            ));
        }
        if self.source.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "Source port must be between 1 and 65535".to_string(),
            ));
        }
        if self.source.idle_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Source idle timeout must be greater than 0".to_string(),
            ));
        }
        if self.source.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Source connect timeout must be greater than 0".to_string(),
            ));
        }

        self.broker.qos_level()?;
        if self.broker.keep_alive_secs > u64::from(u16::MAX) {
            return Err(ConfigError::InvalidConfig(format!(
                "Keep alive must be at most {} seconds, got {}",
                u16::MAX,
                self.broker.keep_alive_secs
            )));
        }
        validate_topic(&self.broker.topic)?;
        crate::transport::mqtt::BrokerEndpoint::parse(&self.broker.normalized_address())
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        HealthMonitor::validate_connection_config(&ReconnectConfig::from_section(&self.broker))
            .map_err(ConfigError::InvalidConfig)?;

        if self.supervisor.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Heartbeat interval must be greater than 0".to_string(),
            ));
        }
        if self.buffer.capacity == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "Buffer capacity must be greater than 0 or omitted for unbounded".to_string(),
            ));
        }
        if self.logging.quiet && self.logging.verbose > 0 {
            return Err(ConfigError::InvalidConfig(
                "Quiet and verbose logging are mutually exclusive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Map a numeric QoS level onto the MQTT client's QoS
pub fn qos_from_level(level: u8) -> Result<QoS, ConfigError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ConfigError::InvalidConfig(format!(
            "QoS must be 0, 1 or 2, got {other}"
        ))),
    }
}

/// Publish topics must be concrete: no wildcards, not empty
fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(ConfigError::InvalidConfig(
            "Topic must not be empty".to_string(),
        ));
    }
    if topic.contains(&['+', '#'][..]) {
        return Err(ConfigError::InvalidConfig(format!(
            "Topic '{topic}' must not contain wildcards"
        )));
    }
    Ok(())
}
