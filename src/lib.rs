//! # ESP Logger Library
//!
//! Log battery/solar telemetry from an ESP32 serial monitor.
//!
//! This library provides the ingest loop that reads JSON lines from the
//! monitor, timestamps them, appends them to a JSONL log and forwards them
//! to the console or an MQTT broker.

pub mod app;
pub mod config;
pub mod error;
pub mod ingest;
pub mod serial;
pub mod sink;
pub mod telemetry;
