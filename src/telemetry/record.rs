//! # Telemetry Record
//!
//! One JSON object received from the monitor.
//!
//! Records have no fixed schema. The monitor conventionally sends:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `soc` | state of charge, 0.0-1.0 |
//! | `v` | battery voltage (V) |
//! | `i` | current (mA) |
//! | `p` | power (W) |
//! | `status` | free-form status string |
//! | `ts` | ISO-8601 timestamp, added by the host when absent |
//!
//! Everything else is passed through untouched, in the order received.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Result;

/// Key holding the record timestamp
pub const TIMESTAMP_KEY: &str = "ts";

/// Why a line could not be turned into a record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A decoded telemetry line
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    fields: Map<String, Value>,
}

/// Typed view of the battery fields of a record
///
/// Missing or non-numeric values read as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryReading {
    pub state_of_charge: Option<f64>,
    pub voltage: Option<f64>,
    pub current_ma: Option<f64>,
    pub power: Option<f64>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
}

/// Format a UTC instant the way `ts` is written
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl TelemetryRecord {
    /// Parse one line of text as a JSON object
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Json`] for malformed JSON and
    /// [`RecordError::NotAnObject`] for valid JSON that is not an object.
    ///
    /// # Examples
    ///
    /// ```
    /// use esp_logger::telemetry::record::TelemetryRecord;
    ///
    /// let record = TelemetryRecord::parse(r#"{"soc":0.853,"v":13.2,"i":450}"#).unwrap();
    /// assert_eq!(record.number("v"), Some(13.2));
    /// assert!(record.timestamp().is_none());
    /// ```
    pub fn parse(line: &str) -> std::result::Result<Self, RecordError> {
        match serde_json::from_str::<Value>(line)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RecordError::NotAnObject(kind_of(&other))),
        }
    }

    /// Add `ts` if the device did not send one
    ///
    /// Returns `true` if a timestamp was injected. An existing `ts` is left
    /// as is, whatever its type.
    pub fn ensure_timestamp(&mut self, now: DateTime<Utc>) -> bool {
        if self.fields.contains_key(TIMESTAMP_KEY) {
            return false;
        }
        self.fields
            .insert(TIMESTAMP_KEY.to_string(), Value::String(format_timestamp(now)));
        true
    }

    /// The `ts` field, if present and a string
    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get(TIMESTAMP_KEY).and_then(Value::as_str)
    }

    /// Numeric field as f64
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn reading(&self) -> BatteryReading {
        BatteryReading {
            state_of_charge: self.number("soc"),
            voltage: self.number("v"),
            current_ma: self.number("i"),
            power: self.number("p"),
            status: self.get("status").and_then(Value::as_str).map(str::to_string),
            timestamp: self.timestamp().map(str::to_string),
        }
    }

    /// Compact JSON, no trailing newline
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

impl BatteryReading {
    /// `[<ts>] SOC: 85.3%, V: 13.20V, I: 450mA`
    pub fn summary(&self) -> String {
        format!(
            "[{}] SOC: {:.1}%, V: {:.2}V, I: {:.0}mA",
            self.timestamp.as_deref().unwrap_or("unknown"),
            self.state_of_charge.unwrap_or(0.0) * 100.0,
            self.voltage.unwrap_or(0.0),
            self.current_ma.unwrap_or(0.0),
        )
    }
}
