//! # Telemetry Module
//!
//! Telemetry records read from the monitor and their JSONL log.
//!
//! This module handles:
//! - Decoding one serial line into a [`record::TelemetryRecord`]
//! - Injecting the host timestamp when the device sent none
//! - Appending records to the JSON Lines log file
//! - The startup time-sync message sent to the device

pub mod jsonl;
pub mod record;
pub mod time_sync;
