//! # Serial Communication Module
//!
//! Handles serial communication with the ESP32 battery monitor.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Sending the startup time-sync message
//! - Reading newline-delimited telemetry with a bounded read timeout

pub mod framer;
pub mod port_trait;

use std::time::Duration;

use crate::config::SerialConfig;
use crate::error::{EspLoggerError, Result};
use crate::telemetry::time_sync::TimeSync;
use framer::{LineFramer, RawLine};
use port_trait::{SerialPortIO, TokioSerialPort};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Bytes reserved in the read buffer before each read
const READ_CHUNK: usize = 256;

/// ESP32 Monitor Serial Handler
///
/// Owns the port and the line framer for the lifetime of the logger.
pub struct TelemetrySerial<P = TokioSerialPort> {
    /// Serial port handle
    port: P,
    /// Partial-line buffer
    framer: LineFramer,
    /// Bound on a single read
    read_timeout: Duration,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl<P> std::fmt::Debug for TelemetrySerial<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySerial")
            .field("device_path", &self.device_path)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl TelemetrySerial<TokioSerialPort> {
    /// Open the configured serial device
    ///
    /// # Errors
    ///
    /// Returns [`EspLoggerError::SerialOpen`] if the device cannot be opened.
    /// Callers treat this as fatal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use esp_logger::config::SerialConfig;
    /// use esp_logger::serial::TelemetrySerial;
    ///
    /// let serial = TelemetrySerial::open(&SerialConfig::default())?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", config.port, config.baud_rate);

        let port = Self::open_port(&config.port, config.baud_rate, config.read_timeout())?;
        info!("Successfully opened serial device at {}", config.port);

        Ok(Self::from_port(
            TokioSerialPort::new(port),
            &config.port,
            config.read_timeout(),
            config.max_line_bytes,
        ))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| EspLoggerError::SerialOpen {
                path: path.to_string(),
                message: e.to_string(),
            })
    }
}

impl<P: SerialPortIO> TelemetrySerial<P> {
    /// Wrap an already-open port
    pub fn from_port(port: P, device_path: &str, read_timeout: Duration, max_line_bytes: usize) -> Self {
        Self {
            port,
            framer: LineFramer::new(max_line_bytes),
            read_timeout,
            device_path: device_path.to_string(),
        }
    }

    /// Send the time-sync message as one newline-terminated JSON line
    pub async fn send_time_sync(&mut self, sync: &TimeSync) -> Result<()> {
        let packet = sync.to_line()?;

        self.port.write_all(packet.as_bytes()).await
            .map_err(|e| EspLoggerError::Serial(format!("Failed to write time sync: {}", e)))?;

        self.port.flush().await
            .map_err(|e| EspLoggerError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent time sync ({} bytes)", packet.len());
        Ok(())
    }

    /// Read the next line from the device
    ///
    /// Returns `Ok(None)` if the read timeout elapses without a complete
    /// line. Partial lines are kept for the next call, so this is safe to
    /// cancel (e.g., from a `tokio::select!` branch).
    ///
    /// # Errors
    ///
    /// Returns error if the underlying read fails or the stream reaches EOF.
    pub async fn next_line(&mut self) -> Result<Option<RawLine>> {
        loop {
            if let Some(line) = self.framer.next_line() {
                return Ok(Some(line));
            }

            let buf = self.framer.buffer_mut();
            buf.reserve(READ_CHUNK);

            match tokio::time::timeout(self.read_timeout, self.port.read(buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => {
                    return Err(EspLoggerError::Serial(format!(
                        "Serial stream {} closed",
                        self.device_path
                    )))
                }
                Ok(Ok(n)) => debug!("Read {} bytes", n),
                Ok(Err(e)) => {
                    return Err(EspLoggerError::Serial(format!("Failed to read: {}", e)))
                }
            }
        }
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}
