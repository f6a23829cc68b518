//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) yields the stock logger setup.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{EspLoggerError, Result};
use crate::sink::SinkKind;

/// Baud rates accepted for the monitor's USB-serial bridge
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bound on a single blocking read
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Wait after opening the port; opening resets the ESP32
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

/// JSONL log file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

/// Ingest loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Sink selection
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default)]
    pub kind: SinkKind,

    /// Minimum spacing of console status lines
    #[serde(default = "default_status_interval_s")]
    pub status_interval_s: u64,
}

/// MQTT broker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_mqtt_topic")]
    pub topic: String,

    #[serde(default = "default_keep_alive_s")]
    pub keep_alive_s: u64,

    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 1000 }
fn default_settle_delay_ms() -> u64 { 2000 }
fn default_max_line_bytes() -> usize { 4096 }

fn default_log_path() -> PathBuf { PathBuf::from("/var/log/esp_logger/esp_log.jsonl") }

fn default_retry_delay_ms() -> u64 { 1000 }

fn default_status_interval_s() -> u64 { 60 }

fn default_mqtt_host() -> String { "broker.hivemq.com".to_string() }
fn default_mqtt_port() -> u16 { 1883 }
fn default_mqtt_topic() -> String { "seqfab/sensors/sol".to_string() }
fn default_keep_alive_s() -> u64 { 60 }
fn default_client_id_prefix() -> String { "esp-logger".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { path: default_log_path() }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { retry_delay_ms: default_retry_delay_ms() }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            status_interval_s: default_status_interval_s(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            topic: default_mqtt_topic(),
            keep_alive_s: default_keep_alive_s(),
            client_id_prefix: default_client_id_prefix(),
        }
    }
}

impl SerialConfig {
    /// Read timeout as Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Settle delay as Duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl IngestConfig {
    /// Pause after a failed iteration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl SinkConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_s)
    }
}

impl MqttConfig {
    /// Get keep-alive as Duration
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_s)
    }
}

fn invalid(message: impl std::fmt::Display) -> EspLoggerError {
    EspLoggerError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use esp_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.settle_delay_ms > 10000 {
            return Err(invalid("settle_delay_ms must be at most 10000"));
        }

        if self.serial.max_line_bytes < 64 {
            return Err(invalid("max_line_bytes must be at least 64"));
        }

        if self.log.path.as_os_str().is_empty() {
            return Err(invalid("log path cannot be empty"));
        }

        if self.ingest.retry_delay_ms == 0 || self.ingest.retry_delay_ms > 60000 {
            return Err(invalid("retry_delay_ms must be between 1 and 60000"));
        }

        if self.sink.status_interval_s == 0 {
            return Err(invalid("status_interval_s must be greater than 0"));
        }

        // Broker settings only matter when that sink is selected
        if self.sink.kind == SinkKind::Mqtt {
            if self.mqtt.host.is_empty() {
                return Err(invalid("mqtt host cannot be empty"));
            }

            if self.mqtt.port == 0 {
                return Err(invalid("mqtt port must be greater than 0"));
            }

            if self.mqtt.topic.is_empty() {
                return Err(invalid("mqtt topic cannot be empty"));
            }

            if self.mqtt.topic.contains(['+', '#']) {
                return Err(invalid("mqtt topic cannot contain wildcards (+ or #)"));
            }

            if self.mqtt.keep_alive_s < 5 {
                return Err(invalid("keep_alive_s must be at least 5"));
            }
        }

        Ok(())
    }
}
