use anyhow::Result;
use bazaar_core::kafka::{produce_message, KafkaProducer};
use chrono::Utc;
use serde::Serialize;

pub const LOGS_TOPIC: &str = "logs";

#[derive(Debug, Serialize)]
struct LogEvent<'a> {
    source: Option<&'a str>,
    line: &'a str,
    emitted_at: chrono::DateTime<Utc>,
}

/// Producer side of the log pipeline: appends one durable record per emitted
/// line. The broker acknowledges before `emit` returns, so an accepted line
/// survives a crash of every dashboard and of this process.
#[derive(Clone)]
pub struct LogEmitter {
    producer: KafkaProducer,
}

impl LogEmitter {
    pub fn new(producer: KafkaProducer) -> Self {
        Self { producer }
    }

    /// Publishes a log line to the `logs` topic. `source` doubles as the
    /// partition key so lines from one emitter stay ordered.
    pub async fn emit(&self, source: Option<&str>, line: &str) -> Result<()> {
        let event = LogEvent {
            source,
            line,
            emitted_at: Utc::now(),
        };

        let payload = serde_json::to_vec(&event)?;
        produce_message(&self.producer, LOGS_TOPIC, source, &payload).await?;

        tracing::debug!("Emitted log line to topic {}", LOGS_TOPIC);

        Ok(())
    }
}
