//! # Sink Module
//!
//! Where a record goes after it has been written to the log.
//!
//! At most one sink is active per process:
//! - `console`: throttled status line with SOC, voltage and current
//! - `mqtt`: every record published to a broker topic
//! - `none`: log file only

pub mod console;
pub mod mqtt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::telemetry::record::TelemetryRecord;

/// Sink selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    None,
    #[default]
    Console,
    Mqtt,
}

/// Destination for logged records
#[async_trait]
pub trait RecordSink: Send {
    /// Forward a record that has already been written to the log.
    ///
    /// `line` is the exact JSON text written to the log, without the newline.
    async fn forward(&mut self, record: &TelemetryRecord, line: &str) -> Result<()>;

    /// Flush and release the sink at shutdown
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        kind: SinkKind,
    }

    #[test]
    fn test_sink_kind_names() {
        for (text, kind) in [("none", SinkKind::None), ("console", SinkKind::Console), ("mqtt", SinkKind::Mqtt)] {
            let parsed: Wrapper = toml::from_str(&format!("kind = \"{}\"", text)).unwrap();
            assert_eq!(parsed.kind, kind);
        }
    }
}
