//! Startup time-sync message.
//!
//! The ESP32 has no RTC; it timestamps its own readings from the epoch it is
//! sent once the port is opened.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// `{"epoch": <unix seconds>}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSync {
    pub epoch: i64,
}

impl TimeSync {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { epoch: now.timestamp() }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Newline-terminated JSON as sent on the wire
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_format() {
        let sync = TimeSync { epoch: 1_760_000_000 };
        assert_eq!(sync.to_line().unwrap(), "{\"epoch\":1760000000}\n");
    }

    #[test]
    fn test_at_truncates_to_seconds() {
        let now = Utc.timestamp_opt(1_700_000_123, 999_000_000).unwrap();
        assert_eq!(TimeSync::at(now).epoch, 1_700_000_123);
    }
}
