//! # Startup and Shutdown
//!
//! Wires the configured components into an [`IngestLoop`].

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::ingest::IngestLoop;
use crate::serial::port_trait::TokioSerialPort;
use crate::serial::TelemetrySerial;
use crate::sink::console::ConsoleSink;
use crate::sink::mqtt::MqttSink;
use crate::sink::{RecordSink, SinkKind};
use crate::telemetry::jsonl::JsonlWriter;
use crate::telemetry::time_sync::TimeSync;

/// Open the device, sync its clock, build the sink and open the log
///
/// The serial port is opened first so that a missing device fails before
/// anything touches the log directory.
///
/// # Errors
///
/// Returns error if the serial port cannot be opened or the log file cannot
/// be created. Both are fatal.
pub async fn start(config: &Config) -> Result<IngestLoop<TokioSerialPort>> {
    let mut serial = TelemetrySerial::open(&config.serial)?;

    // Opening the port toggles DTR, which resets the ESP32
    tokio::time::sleep(config.serial.settle_delay()).await;

    let sync = TimeSync::now();
    match serial.send_time_sync(&sync).await {
        Ok(()) => info!("Sent time sync: {}", sync.epoch),
        Err(e) => warn!("Time sync failed, device keeps its own clock: {}", e),
    }

    let sink = build_sink(config);
    let log = JsonlWriter::open(&config.log.path).await?;

    info!("ESP logger started, writing to {}", config.log.path.display());
    Ok(IngestLoop::new(serial, log, sink, config.ingest.retry_delay()))
}

/// Build the configured sink, if any
pub fn build_sink(config: &Config) -> Option<Box<dyn RecordSink>> {
    match config.sink.kind {
        SinkKind::None => None,
        SinkKind::Console => Some(Box::new(ConsoleSink::new(config.sink.status_interval()))),
        SinkKind::Mqtt => {
            info!("Publishing to MQTT topic {}", config.mqtt.topic);
            Some(Box::new(MqttSink::connect(&config.mqtt)))
        }
    }
}

/// Completes on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_sink_none() {
        let mut config = Config::default();
        config.sink.kind = SinkKind::None;
        assert!(build_sink(&config).is_none());
    }

    #[tokio::test]
    async fn test_build_sink_console() {
        assert!(build_sink(&Config::default()).is_some());
    }

    #[tokio::test]
    async fn test_start_fails_before_touching_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.serial.port = "/dev/nonexistent_esp32_port".to_string();
        config.log.path = dir.path().join("esp_logger/esp_log.jsonl");

        assert!(start(&config).await.is_err());
        assert!(!dir.path().join("esp_logger").exists());
    }
}
