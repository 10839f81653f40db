//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use socket_queue_bridge::config::{BridgeConfig, ConfigError, OverflowPolicy};
use socket_queue_bridge::framing::FramingMode;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[source]
host = "10.0.0.5"
port = 4001
framing = "text"
idle_timeout_ms = 10000

[broker]
address = "mqtts://broker.example.com"
topic = "plant/line1/temperature"
qos = 1
username_env = "MQTT_USER"
password_env = "MQTT_PASS"
reconnect_backoff_ms = [100, 500, 2000]
max_reconnect_attempts = 10

[buffer]
capacity = 10000
overflow = "drop_newest"

[supervisor]
heartbeat_interval_ms = 500
stats_interval_secs = 0

[logging]
verbose = 1
file = "/var/log/bridge.log"
"#
    )
    .unwrap();

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.source.host, "10.0.0.5");
    assert_eq!(config.source.port, 4001);
    assert_eq!(config.source.framing, FramingMode::Text);
    assert_eq!(config.source.idle_timeout_ms, 10000);
    assert_eq!(config.broker.address, "mqtts://broker.example.com");
    assert_eq!(config.broker.normalized_address(), "mqtts://broker.example.com:8883");
    assert_eq!(config.broker.username_env, Some("MQTT_USER".to_string()));
    assert_eq!(config.broker.reconnect_backoff_ms, vec![100, 500, 2000]);
    assert_eq!(config.broker.max_reconnect_attempts, Some(10));
    assert_eq!(config.buffer.capacity, Some(10000));
    assert_eq!(config.buffer.overflow, OverflowPolicy::DropNewest);
    assert_eq!(config.supervisor.stats_interval(), None);
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/bridge.log")));
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_file_gives_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config, BridgeConfig::default());
}

#[test]
fn test_config_missing_file_returns_error() {
    let result = BridgeConfig::load_from_file(std::path::Path::new("/nonexistent/bridge.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_malformed_toml_returns_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[source\nhost = ").unwrap();

    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_wrong_type_returns_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[source]\nport = \"not-a-number\"").unwrap();

    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_unknown_framing_returns_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[source]\nframing = \"json\"").unwrap();

    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_loaded_config_with_bad_qos_fails_validation() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[broker]\nqos = 3").unwrap();

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("QoS"));
}

#[test]
fn test_zero_reconnect_attempts_fails_validation() {
    let mut config = BridgeConfig::default();
    config.broker.max_reconnect_attempts = Some(0);
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_serializes_to_json() {
    let config = BridgeConfig::default();
    let json = serde_json::to_value(&config).unwrap();

    assert_eq!(json["source"]["host"], "localhost");
    assert_eq!(json["source"]["framing"], "binary");
    assert_eq!(json["broker"]["topic"], "sensor/flock");
    assert_eq!(json["buffer"]["overflow"], "drop_oldest");
}

#[test]
fn test_zero_source_timeouts_fail_validation() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[source]\nidle_timeout_ms = 0").unwrap();
    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));

    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[source]\nconnect_timeout_ms = 0").unwrap();
    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
}
