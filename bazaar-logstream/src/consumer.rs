use anyhow::Result;
use bazaar_core::BazaarContext;
use bazaar_dispatch::BatchDispatcher;
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::producer::LOGS_TOPIC;

const GROUP_ID: &str = "log-events-group";

/// Consumes the `logs` topic and feeds the batching dispatcher.
///
/// Offsets are committed only after a record is buffered, so a crash between
/// receive and commit redelivers the record on restart (at-least-once). A
/// fresh consumer group starts from the earliest retained offset, which is
/// how a first-time dashboard viewer gets the replay.
pub async fn run(ctx: BazaarContext, dispatcher: Arc<BatchDispatcher>) -> Result<()> {
    tracing::info!("Starting log consumer");

    let consumer = ctx.create_consumer(Some(GROUP_ID))?;
    consumer.subscribe(&[LOGS_TOPIC])?;

    tracing::info!("Subscribed to topic: {}", LOGS_TOPIC);

    let mut error_count = 0u32;
    let mut last_error_log = std::time::Instant::now();

    loop {
        match consumer.recv().await {
            Ok(message) => {
                error_count = 0;
                if let Some(payload) = message.payload() {
                    match std::str::from_utf8(payload) {
                        Ok(record) => dispatcher.enqueue(record.to_string()),
                        Err(e) => {
                            // Malformed record: drop it, don't crash, and
                            // still advance past it
                            tracing::warn!("Dropping non-UTF-8 log record: {}", e);
                        }
                    }
                }
                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::warn!("Failed to commit offset: {}", e);
                }
            }
            Err(e) => {
                error_count += 1;
                // Rate-limit the error log to one line per 30 seconds
                if last_error_log.elapsed().as_secs() >= 30 {
                    tracing::warn!(
                        "Error receiving from log topic (error count: {}): {}",
                        error_count,
                        e
                    );
                    last_error_log = std::time::Instant::now();
                }
                // Exponential backoff: 1s, 2s, 4s, max 30s
                let backoff =
                    Duration::from_secs(1 << error_count.min(5)).min(Duration::from_secs(30));
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
