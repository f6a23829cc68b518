//! # Ingest Loop
//!
//! Reads telemetry lines from the serial port, timestamps them, appends them
//! to the JSONL log and hands them to the configured sink.
//!
//! ## Outcomes
//!
//! Each line is classified into a [`LineOutcome`] before anything is written:
//!
//! | Input | Outcome | Handling |
//! |-------|---------|----------|
//! | JSON object | `Record` | log, forward to sink |
//! | empty / whitespace | `Skip(Empty)` | silent |
//! | malformed or non-object JSON | `Skip(Malformed)` | warning, no delay |
//! | invalid UTF-8, overlong | `Skip(Unframed)` | warning, no delay |
//!
//! Anything that fails after classification (log write, sink, serial read)
//! is an iteration error: it is logged and the loop sleeps for the retry
//! delay before reading again. There is no retry limit.
//!
//! ## Cancellation
//!
//! The shutdown future is only raced against the serial read and the retry
//! sleep. A line that has been read is always fully logged and forwarded
//! before shutdown is honored.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, trace, warn};

use crate::error::Result;
use crate::serial::framer::{FrameError, RawLine};
use crate::serial::port_trait::SerialPortIO;
use crate::serial::TelemetrySerial;
use crate::sink::RecordSink;
use crate::telemetry::jsonl::JsonlWriter;
use crate::telemetry::record::{RecordError, TelemetryRecord};

/// Why a line produced no record
#[derive(Debug)]
pub enum SkipReason {
    /// Blank after trimming
    Empty,
    /// Not a JSON object
    Malformed { line: String, error: RecordError },
    /// Could not be framed as a text line
    Unframed(FrameError),
}

/// Classification of one raw line
#[derive(Debug)]
pub enum LineOutcome {
    Record(TelemetryRecord),
    Skip(SkipReason),
}

/// Result of one loop iteration
#[derive(Debug)]
pub enum Step {
    /// Read timed out with no complete line
    Idle,
    /// Line was skipped
    Skipped(SkipReason),
    /// Record was logged (and forwarded); `line` is what was written
    Logged { record: TelemetryRecord, line: String },
}

/// Counters reported at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines received from the device, including skipped ones
    pub lines: u64,
    /// Records appended to the log
    pub records: u64,
    /// Lines skipped (empty, malformed, unframed)
    pub skipped: u64,
    /// Iterations that failed and were retried
    pub errors: u64,
}

/// Classify a framed line without side effects
pub fn classify_line(raw: RawLine) -> LineOutcome {
    let text = match raw {
        Ok(text) => text,
        Err(e) => return LineOutcome::Skip(SkipReason::Unframed(e)),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skip(SkipReason::Empty);
    }

    match TelemetryRecord::parse(trimmed) {
        Ok(record) => LineOutcome::Record(record),
        Err(error) => LineOutcome::Skip(SkipReason::Malformed {
            line: trimmed.to_string(),
            error,
        }),
    }
}

/// The read-parse-write loop
pub struct IngestLoop<P: SerialPortIO> {
    serial: TelemetrySerial<P>,
    log: JsonlWriter,
    sink: Option<Box<dyn RecordSink>>,
    retry_delay: Duration,
    stats: IngestStats,
}

impl<P: SerialPortIO> IngestLoop<P> {
    pub fn new(
        serial: TelemetrySerial<P>,
        log: JsonlWriter,
        sink: Option<Box<dyn RecordSink>>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            serial,
            log,
            sink,
            retry_delay,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Process one framed line received at `now`
    ///
    /// # Errors
    ///
    /// Returns error if the log write or the sink fails. Skipped lines are
    /// not errors.
    pub async fn handle_line(&mut self, raw: RawLine, now: DateTime<Utc>) -> Result<Step> {
        self.stats.lines += 1;

        let mut record = match classify_line(raw) {
            LineOutcome::Record(record) => record,
            LineOutcome::Skip(reason) => {
                match &reason {
                    SkipReason::Empty => trace!("Skipping empty line"),
                    SkipReason::Malformed { line, error } => warn!("Bad JSON ({}): {}", error, line),
                    SkipReason::Unframed(e) => warn!("Unreadable line: {}", e),
                }
                self.stats.skipped += 1;
                return Ok(Step::Skipped(reason));
            }
        };

        record.ensure_timestamp(now);
        let line = record.to_json_line()?;

        self.log.append(&line).await?;
        self.stats.records += 1;

        if let Some(sink) = self.sink.as_mut() {
            sink.forward(&record, &line).await?;
        }

        Ok(Step::Logged { record, line })
    }

    /// Run a single iteration: wait for a line (bounded) and process it
    pub async fn step(&mut self) -> Result<Step> {
        match self.serial.next_line().await? {
            None => Ok(Step::Idle),
            Some(raw) => self.handle_line(raw, Utc::now()).await,
        }
    }

    /// Run until `shutdown` completes, then close the sink and the log
    ///
    /// Returns the final counters. Errors while closing are logged, not
    /// returned, so shutdown always completes.
    pub async fn run<F>(mut self, shutdown: F) -> IngestStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Reading telemetry from {}", self.serial.device_path());

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = self.serial.next_line() => next,
            };

            let outcome = match next {
                Ok(None) => Ok(Step::Idle),
                Ok(Some(raw)) => self.handle_line(raw, Utc::now()).await,
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                error!("{}", e);
                self.stats.errors += 1;

                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        info!("Shutting down...");
        self.shutdown().await
    }

    async fn shutdown(mut self) -> IngestStats {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.close().await {
                warn!("Failed to close sink: {}", e);
            }
        }

        if let Err(e) = self.log.close().await {
            warn!("Failed to close log file: {}", e);
        }

        let stats = self.stats;
        info!(
            "Processed {} lines: {} logged, {} skipped, {} errors",
            stats.lines, stats.records, stats.skipped, stats.errors
        );
        stats
    }
}
