//! Crate-level error types
//!
//! Only startup can fail: a bad configuration, an unusable log file or a
//! broker address the MQTT client cannot be built from. Everything that goes
//! wrong after the bridge is running is recovered inside the component that
//! sees it and never surfaces as an `Err`.

use crate::config::ConfigError;
use crate::transport::mqtt::MqttError;
use thiserror::Error;

/// Main error type for bridge startup and shutdown
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("MQTT transport error: {0}")]
    MqttError(#[from] MqttError),

    #[error("Logging setup failed: {message}")]
    LoggingError { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create logging setup error
    pub fn logging_error<S: Into<String>>(message: S) -> Self {
        Self::LoggingError {
            message: message.into(),
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
