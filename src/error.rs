//! # Error Types
//!
//! Custom error types for ESP Logger using `thiserror`.

use thiserror::Error;

/// Main error type for ESP Logger
#[derive(Debug, Error)]
pub enum EspLoggerError {
    /// Serial stream errors after the port has been opened
    #[error("Serial error: {0}")]
    Serial(String),

    /// The serial device could not be opened at startup
    #[error("Failed to open serial port {path}: {message}")]
    SerialOpen {
        /// Device path that was tried
        path: String,
        /// Underlying driver message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Broker client errors
    #[error("MQTT error: {0}")]
    Mqtt(String),
}

impl From<rumqttc::ClientError> for EspLoggerError {
    fn from(err: rumqttc::ClientError) -> Self {
        EspLoggerError::Mqtt(err.to_string())
    }
}

/// Result type alias for ESP Logger
pub type Result<T> = std::result::Result<T, EspLoggerError>;
