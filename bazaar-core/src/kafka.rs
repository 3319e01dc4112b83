use anyhow::{anyhow, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::config::KafkaConfig;

pub type KafkaProducer = Arc<FutureProducer>;
pub type KafkaConsumer = Arc<StreamConsumer>;

fn build_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();

    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("metadata.request.timeout.ms", "30000")
        .set("socket.timeout.ms", "30000")
        .set("socket.keepalive.enable", "true");

    // Optional SSL/TLS, driven by env like the rest of the broker settings
    if let Ok(ssl_enabled) = std::env::var("KAFKA_SSL_ENABLED") {
        if ssl_enabled == "true" || ssl_enabled == "1" {
            tracing::info!("SSL/TLS enabled for Kafka connection");
            client_config.set("security.protocol", "ssl");

            if let Ok(ca_location) = std::env::var("KAFKA_SSL_CA_LOCATION") {
                client_config.set("ssl.ca.location", &ca_location);
            }
            if let Ok(cert_location) = std::env::var("KAFKA_SSL_CERT_LOCATION") {
                client_config.set("ssl.certificate.location", &cert_location);
            }
            if let Ok(key_location) = std::env::var("KAFKA_SSL_KEY_LOCATION") {
                client_config.set("ssl.key.location", &key_location);
            }
        }
    }

    client_config
}

pub fn create_producer(config: &KafkaConfig) -> Result<KafkaProducer> {
    tracing::info!("Creating Kafka producer, brokers: {}", config.brokers);

    let producer: FutureProducer = build_client_config(config)
        .set("message.timeout.ms", "5000")
        .set("acks", "all")
        .set("retries", "3")
        .create()
        .map_err(|e| {
            tracing::error!("Failed to create Kafka producer: {}", e);
            anyhow!("Failed to create Kafka producer: {}", e)
        })?;

    tracing::info!("Kafka producer created (connection established on first use)");

    Ok(Arc::new(producer))
}

/// Creates a consumer joined to `group_id` (or the configured default group).
///
/// Auto-commit is off: the consumer loop commits an offset only after the
/// record has been handled, so a crash mid-handling redelivers on restart.
pub fn create_consumer(config: &KafkaConfig, group_id: Option<&str>) -> Result<KafkaConsumer> {
    let group = group_id.unwrap_or(&config.consumer_group);
    tracing::info!(
        "Creating Kafka consumer, brokers: {}, group: {}",
        config.brokers,
        group
    );

    let consumer: StreamConsumer = build_client_config(config)
        .set("group.id", group)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "30000")
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()
        .map_err(|e| {
            tracing::error!("Failed to create Kafka consumer (group {}): {}", group, e);
            anyhow!("Failed to create Kafka consumer: {}", e)
        })?;

    tracing::info!("Kafka consumer created (connection established on first use)");

    Ok(Arc::new(consumer))
}

/// Appends a record; the partition is selected by the key's hash, or
/// round-robin when no key is given. Returns once the broker acknowledges
/// the write (acks=all).
pub async fn produce_message(
    producer: &KafkaProducer,
    topic: &str,
    key: Option<&str>,
    payload: &[u8],
) -> Result<()> {
    let mut record = FutureRecord::to(topic).payload(payload);

    if let Some(k) = key {
        record = record.key(k);
    }

    match producer.send(record, Duration::from_secs(5)).await {
        Ok((partition, offset)) => {
            tracing::debug!(
                "Record delivered to topic {} partition {} offset {}",
                topic,
                partition,
                offset
            );
            Ok(())
        }
        Err((e, _)) => {
            tracing::error!("Failed to deliver record to topic {}: {:?}", topic, e);
            Err(anyhow!("Failed to deliver record: {:?}", e))
        }
    }
}
