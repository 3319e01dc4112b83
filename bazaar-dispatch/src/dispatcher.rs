use std::sync::{Arc, Mutex};
use std::time::Duration;

use bazaar_core::registry::{AudienceFilter, ConnectionRegistry};
use tracing;

/// Timer-driven fan-out of buffered log records to admin dashboards.
///
/// Producers (the log consumer) enqueue records as they arrive; every
/// `flush_interval` the pending buffer is swapped out atomically and each
/// record is written to every open admin connection. The fixed cadence trades
/// a small latency for one wakeup per tick instead of one per record, and a
/// burst of producer events never turns into a burst of transport writes.
pub struct BatchDispatcher {
    registry: Arc<ConnectionRegistry>,
    pending: Mutex<Vec<String>>,
    flush_interval: Duration,
}

impl BatchDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, flush_interval: Duration) -> Self {
        Self {
            registry,
            pending: Mutex::new(Vec::new()),
            flush_interval,
        }
    }

    /// Buffers a record for the next tick. Never blocks and never touches the
    /// transport.
    pub fn enqueue(&self, payload: String) {
        let mut pending = self.pending.lock().expect("dispatch buffer lock poisoned");
        pending.push(payload);
    }

    /// Drains the buffer and fans the batch out. Returns the number of
    /// records flushed.
    ///
    /// The swap happens under the lock, so records enqueued while the fan-out
    /// is running land in a fresh buffer for the next tick instead of being
    /// lost or sent twice. A failed write to one connection is logged and the
    /// remaining connections still receive the batch.
    pub fn flush(&self) -> usize {
        let batch = {
            let mut pending = self.pending.lock().expect("dispatch buffer lock poisoned");
            std::mem::take(&mut *pending)
        };

        if batch.is_empty() {
            return 0;
        }

        for record in &batch {
            self.registry.for_each(AudienceFilter::Admins, |sender| {
                if let Err(e) = sender.send(record.clone()) {
                    tracing::warn!("Dropping log record for closed dashboard connection: {}", e);
                }
            });
        }

        batch.len()
    }

    /// Runs the tick loop until the process shuts down.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            "Starting batch dispatcher, flush interval {:?}",
            self.flush_interval
        );

        let mut ticker = tokio::time::interval(self.flush_interval);
        // interval fires immediately once; skip that tick so the first flush
        // happens a full interval after startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let flushed = self.flush();
            if flushed > 0 {
                tracing::debug!("Flushed {} log records to admin dashboards", flushed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::registry::Audience;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn every_buffered_record_reaches_every_open_dashboard() {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = BatchDispatcher::new(registry.clone(), Duration::from_secs(3));

        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let _a = registry.clone().register(Audience::Admins, a_tx);
        let _b = registry.clone().register(Audience::Admins, b_tx);

        for i in 0..50 {
            dispatcher.enqueue(format!("log line {}", i));
        }

        assert_eq!(dispatcher.flush(), 50);
        assert_eq!(drain(&mut a_rx).len(), 50);
        assert_eq!(drain(&mut b_rx).len(), 50);

        // Buffer is empty after the tick; nothing is delivered twice
        assert_eq!(dispatcher.flush(), 0);
        assert!(drain(&mut a_rx).is_empty());
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn empty_buffer_tick_is_a_no_op() {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = BatchDispatcher::new(registry.clone(), Duration::from_secs(3));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = registry.clone().register(Audience::Admins, tx);

        assert_eq!(dispatcher.flush(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn failed_connection_does_not_starve_the_rest_of_the_batch() {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = BatchDispatcher::new(registry.clone(), Duration::from_secs(3));

        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        let _dead = registry.clone().register(Audience::Admins, dead_tx);
        let _live = registry.clone().register(Audience::Admins, live_tx);

        // Simulate a client that went away mid-batch
        drop(dead_rx);

        dispatcher.enqueue("a".to_string());
        dispatcher.enqueue("b".to_string());
        assert_eq!(dispatcher.flush(), 2);

        assert_eq!(drain(&mut live_rx), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn records_enqueued_after_the_swap_start_a_fresh_batch() {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = BatchDispatcher::new(registry.clone(), Duration::from_secs(3));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = registry.clone().register(Audience::Admins, tx);

        dispatcher.enqueue("first".to_string());
        assert_eq!(dispatcher.flush(), 1);

        dispatcher.enqueue("second".to_string());
        assert_eq!(dispatcher.flush(), 1);

        assert_eq!(drain(&mut rx), vec!["first".to_string(), "second".to_string()]);
    }
}
