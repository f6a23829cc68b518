//! # MQTT Sink
//!
//! Publishes every logged record to one broker topic.
//!
//! Delivery is fire-and-forget (QoS 0, not retained). The rumqttc event loop
//! runs in its own task and reconnects on its own; the ingest loop never
//! waits on the network: if the client's request queue is full the publish
//! fails and the iteration is retried like any other sink error.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use super::RecordSink;
use crate::config::MqttConfig;
use crate::error::{EspLoggerError, Result};
use crate::telemetry::record::TelemetryRecord;

/// Pending requests the client buffers before publishes start failing
const REQUEST_CAPACITY: usize = 64;

/// Pause before the event loop retries a failed connection
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long shutdown waits for the disconnect to go out
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimal publish interface over a broker client
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Publisher: Send {
    /// Queue `payload` for `topic` without waiting for the network
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Send the disconnect and stop the client
    async fn disconnect(&mut self) -> Result<()>;
}

/// rumqttc client plus the task driving its event loop
pub struct RumqttPublisher {
    client: AsyncClient,
    driver: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RumqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RumqttPublisher").finish_non_exhaustive()
    }
}

impl RumqttPublisher {
    /// Create the client and spawn its event loop
    ///
    /// Must be called from within a tokio runtime. The connection itself is
    /// made lazily by the event loop; failures are logged and retried there.
    pub fn connect(config: &MqttConfig) -> Self {
        let client_id = format!("{}-{}", config.client_id_prefix, Uuid::new_v4());
        let mut options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive());

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        info!("MQTT client {} connecting to {}:{}", client_id, config.host, config.port);

        let driver = tokio::spawn(drive_event_loop(eventloop));
        Self { client, driver: Some(driver) }
    }
}

/// Poll the event loop until the disconnect has been sent
async fn drive_event_loop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(event) => debug!("MQTT event: {:?}", event),
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl Publisher for RumqttPublisher {
    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client.try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let result = self.client.try_disconnect();

        if let Some(mut driver) = self.driver.take() {
            if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut driver).await.is_err() {
                warn!("MQTT event loop did not stop in time, aborting");
                driver.abort();
            }
        }

        result.map_err(EspLoggerError::from)
    }
}

/// Sink publishing each record to a fixed topic
pub struct MqttSink<P = RumqttPublisher> {
    publisher: P,
    topic: String,
    published: u64,
}

impl<P: Publisher> MqttSink<P> {
    pub fn new(publisher: P, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            published: 0,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Records handed to the client so far
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl MqttSink<RumqttPublisher> {
    pub fn connect(config: &MqttConfig) -> Self {
        Self::new(RumqttPublisher::connect(config), config.topic.clone())
    }
}

#[async_trait]
impl<P: Publisher> RecordSink for MqttSink<P> {
    async fn forward(&mut self, record: &TelemetryRecord, line: &str) -> Result<()> {
        self.publisher.publish(&self.topic, line.as_bytes().to_vec())?;
        self.published += 1;
        info!("[{}] -> MQTT + file", record.timestamp().unwrap_or("unknown"));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        info!("Disconnecting from MQTT broker after {} messages", self.published);
        self.publisher.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "seqfab/sensors/sol";

    #[tokio::test]
    async fn test_publishes_log_line_verbatim() {
        let line = r#"{"soc":0.853,"v":13.2,"i":450,"ts":"2026-10-16T12:00:00.000000Z"}"#;
        let record = TelemetryRecord::parse(line).unwrap();

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(move |topic, payload| topic == TOPIC && payload.as_slice() == line.as_bytes())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut sink = MqttSink::new(publisher, TOPIC);
        sink.forward(&record, line).await.unwrap();
        assert_eq!(sink.published(), 1);
    }

    #[tokio::test]
    async fn test_publish_error_propagates() {
        let record = TelemetryRecord::parse("{}").unwrap();

        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(EspLoggerError::Mqtt("request queue full".to_string())));

        let mut sink = MqttSink::new(publisher, TOPIC);
        let err = sink.forward(&record, "{}").await.unwrap_err();
        assert!(matches!(err, EspLoggerError::Mqtt(_)));
        assert_eq!(sink.published(), 0);
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let mut publisher = MockPublisher::new();
        publisher.expect_disconnect().times(1).returning(|| Ok(()));

        let mut sink = MqttSink::new(publisher, TOPIC);
        assert_eq!(sink.topic(), TOPIC);
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_rumqtt_publisher_queues_without_broker() {
        let config = MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..MqttConfig::default()
        };
        let mut publisher = RumqttPublisher::connect(&config);

        publisher.publish(TOPIC, b"{}".to_vec()).unwrap();
        // No broker: the disconnect is queued but never sent, so the driver
        // is aborted after the timeout and shutdown still completes.
        let _ = publisher.disconnect().await;
        assert!(publisher.driver.is_none());
    }
}
