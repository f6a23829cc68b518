//! # Console Sink
//!
//! Prints a short status line at most once per status interval.
//!
//! The throttle compares against the last printed time rather than testing
//! `now % 60 == 0`, so a minute is not skipped when no record happens to
//! land on its exact first second.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

use super::RecordSink;
use crate::error::Result;
use crate::telemetry::record::TelemetryRecord;

/// Best-effort "once per interval" gate keyed on wall-clock time
///
/// Time is divided into buckets of `interval` seconds since the Unix epoch.
/// The first record seen in a bucket later than the last printed one fires.
#[derive(Debug, Clone)]
pub struct StatusThrottle {
    interval_secs: i64,
    last_printed: Option<DateTime<Utc>>,
}

impl StatusThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: interval.as_secs().max(1) as i64,
            last_printed: None,
        }
    }

    fn bucket(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.interval_secs)
    }

    /// Returns `true` (and records `now`) if a status line is due
    pub fn should_print(&mut self, now: DateTime<Utc>) -> bool {
        let due = match self.last_printed {
            None => true,
            Some(last) => self.bucket(now) > self.bucket(last),
        };
        if due {
            self.last_printed = Some(now);
        }
        due
    }

    pub fn last_printed(&self) -> Option<DateTime<Utc>> {
        self.last_printed
    }
}

/// Sink that logs a throttled battery summary
#[derive(Debug)]
pub struct ConsoleSink {
    throttle: StatusThrottle,
}

impl ConsoleSink {
    pub fn new(interval: Duration) -> Self {
        Self { throttle: StatusThrottle::new(interval) }
    }

    /// Summary line for `record` if one is due at `now`
    pub fn summarize(&mut self, record: &TelemetryRecord, now: DateTime<Utc>) -> Option<String> {
        self.throttle
            .should_print(now)
            .then(|| record.reading().summary())
    }
}

#[async_trait]
impl RecordSink for ConsoleSink {
    async fn forward(&mut self, record: &TelemetryRecord, _line: &str) -> Result<()> {
        if let Some(summary) = self.summarize(record, Utc::now()) {
            info!("{}", summary);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_one_record_per_second_fires_each_minute() {
        // Minute-aligned start, records every second for 125 s with five dropped
        let start = 1_760_000_040;
        assert_eq!(start % 60, 0);

        let mut throttle = StatusThrottle::new(Duration::from_secs(60));
        let fired: Vec<i64> = (0..125)
            .filter(|s| ![17, 42, 77, 101, 124].contains(s))
            .filter(|&s| throttle.should_print(at(start + s)))
            .collect();

        assert_eq!(fired, vec![0, 60, 120]);
    }

    #[test]
    fn test_missed_boundary_fires_on_next_record() {
        let mut throttle = StatusThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_print(at(120)));
        assert!(!throttle.should_print(at(179)));
        // Nothing arrived at 180; 181 is still the first record of that minute
        assert!(throttle.should_print(at(181)));
        assert!(!throttle.should_print(at(239)));
        assert!(throttle.should_print(at(240)));
    }

    #[test]
    fn test_at_most_once_per_bucket() {
        let mut throttle = StatusThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_print(at(600)));
        assert!(!throttle.should_print(at(600)));
        assert!(!throttle.should_print(at(659)));
        assert_eq!(throttle.last_printed(), Some(at(600)));
    }

    #[test]
    fn test_clock_going_backwards_does_not_fire() {
        let mut throttle = StatusThrottle::new(Duration::from_secs(60));
        assert!(throttle.should_print(at(600)));
        assert!(!throttle.should_print(at(540)));
    }

    #[test]
    fn test_summarize_uses_record_fields() {
        let mut sink = ConsoleSink::new(Duration::from_secs(60));
        let record = TelemetryRecord::parse(r#"{"soc":0.42,"v":12.61,"i":-35.4,"ts":"x"}"#).unwrap();

        assert_eq!(
            sink.summarize(&record, at(0)).as_deref(),
            Some("[x] SOC: 42.0%, V: 12.61V, I: -35mA")
        );
        assert_eq!(sink.summarize(&record, at(30)), None);
    }

    #[tokio::test]
    async fn test_forward_never_fails() {
        let mut sink = ConsoleSink::new(Duration::from_secs(60));
        let record = TelemetryRecord::parse("{}").unwrap();
        assert!(sink.forward(&record, "{}").await.is_ok());
        assert!(sink.forward(&record, "{}").await.is_ok());
        assert!(sink.close().await.is_ok());
    }
}
