//! # ESP Logger
//!
//! Log battery/solar telemetry from an ESP32 serial monitor to a JSONL file,
//! with an optional console status line or MQTT publish per record.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (`--config`, or built-in defaults)
//!    - Open the serial port, wait for the ESP32 reset, send time sync
//!    - Connect the sink and open the log file
//!
//! 2. **Main Loop**
//!    - Read a line, timestamp it, append it to the log, forward it
//!    - Skip blank and malformed lines; pause and retry on other errors
//!
//! 3. **Graceful Shutdown** (Ctrl+C or SIGTERM)
//!    - Disconnect the sink, close the log file and the port
//!    - Log totals
//!
//! Exits non-zero if the configuration is invalid or the serial port cannot
//! be opened.
//!
//! ```text
//! INFO esp_logger::serial: Successfully opened serial device at /dev/ttyUSB0
//! INFO esp_logger::app: Sent time sync: 1760600000
//! INFO esp_logger::app: ESP logger started, writing to /var/log/esp_logger/esp_log.jsonl
//! INFO esp_logger::sink::console: [2026-10-16T08:30:00.000000Z] SOC: 85.3%, V: 13.20V, I: 450mA
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use esp_logger::app;
use esp_logger::config::Config;

#[derive(Parser, Debug)]
#[command(name = "esp-logger", version)]
#[command(about = "Log ESP32 battery monitor telemetry to JSONL and MQTT")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Warnings and errors go to stderr, everything else to stdout
    let (stdout, _stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (stderr, _stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_writer(stderr.with_max_level(tracing::Level::WARN).or_else(stdout))
        .init();

    info!("ESP Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let ingest = match app::start(&config).await {
        Ok(ingest) => ingest,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    info!("Press Ctrl+C to exit");
    ingest.run(app::shutdown_signal()).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_without_config() {
        let args = Args::try_parse_from(["esp-logger"]).unwrap();
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_with_config() {
        let args = Args::try_parse_from(["esp-logger", "--config", "/etc/esp-logger.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/esp-logger.toml")));
    }

    #[test]
    fn test_args_reject_unknown_flag() {
        assert!(Args::try_parse_from(["esp-logger", "--baud", "9600"]).is_err());
    }
}
