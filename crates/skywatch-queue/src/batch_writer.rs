use std::sync::Arc;
use std::time::Duration;

use rdkafka::message::{Message, OwnedMessage};
use skywatch_protocol::MetricEnvelope;
use skywatch_storage::{NewRawMetric, SampleStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::consumer::{Committer, Consumer};
use crate::error::QueueError;

#[derive(Debug, Clone)]
pub struct BatchWriterConfig {
    /// Flush as soon as this many records are pending.
    pub batch_size: usize,
    /// Flush a partial batch after this long.
    pub flush_interval: Duration,
}

impl Default for BatchWriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Drains the raw-metric topic into the relational store.
///
/// A fetch task feeds an internal bounded channel; the flush loop batches
/// records and writes them on size, interval or shutdown. Each record's
/// offset is committed only after its insert succeeded, so a failed write is
/// redelivered on restart (the insert itself is idempotent).
pub struct BatchWriter {
    consumer: Arc<Consumer>,
    store: Arc<dyn SampleStore>,
    config: BatchWriterConfig,
}

impl BatchWriter {
    pub fn new(
        consumer: Arc<Consumer>,
        store: Arc<dyn SampleStore>,
        config: BatchWriterConfig,
    ) -> Self {
        Self {
            consumer,
            store,
            config,
        }
    }

    /// Run until `shutdown` fires. The remaining batch is flushed on exit.
    pub async fn run(&self, shutdown: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<OwnedMessage>(self.config.batch_size);

        let fetcher = {
            let consumer = self.consumer.clone();
            let token = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        fetched = consumer.fetch() => match fetched {
                            Ok(msg) => {
                                if tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "consumer fetch failed");
                            }
                        }
                    }
                }
            })
        };

        let mut batch: Vec<OwnedMessage> = Vec::with_capacity(self.config.batch_size);
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.flush(&mut batch).await;
                    break;
                }
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        tracing::debug!(pending = batch.len(), "flush interval reached");
                        self.flush(&mut batch).await;
                    }
                }
                received = rx.recv() => match received {
                    Some(msg) => {
                        batch.push(msg);
                        if batch.len() >= self.config.batch_size {
                            tracing::debug!(pending = batch.len(), "batch full");
                            self.flush(&mut batch).await;
                        }
                    }
                    None => {
                        self.flush(&mut batch).await;
                        break;
                    }
                }
            }
        }

        // Unblock a fetcher stuck on a full channel before joining it.
        drop(rx);
        let _ = fetcher.await;
    }

    async fn flush(&self, batch: &mut Vec<OwnedMessage>) {
        let drained: Vec<OwnedMessage> = batch.drain(..).collect();
        flush_batch(self.store.as_ref(), self.consumer.as_ref(), drained).await;
    }
}

/// Write a batch record by record, committing each offset only after its
/// insert succeeded. Failed records are logged and left uncommitted for
/// redelivery.
pub(crate) async fn flush_batch(
    store: &dyn SampleStore,
    committer: &dyn Committer,
    batch: Vec<OwnedMessage>,
) {
    if batch.is_empty() {
        return;
    }

    let total = batch.len();
    let mut written = 0usize;
    for msg in &batch {
        match process_record(store, msg).await {
            Ok(fresh) => {
                if !fresh {
                    tracing::debug!(
                        partition = msg.partition(),
                        offset = msg.offset(),
                        "duplicate sample, already stored"
                    );
                }
                written += 1;
                if let Err(e) = committer.commit(msg) {
                    tracing::error!(error = %e, offset = msg.offset(), "offset commit failed");
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    partition = msg.partition(),
                    offset = msg.offset(),
                    "failed to persist record"
                );
            }
        }
    }
    tracing::info!(written, total, "flushed batch to database");
}

async fn process_record(store: &dyn SampleStore, msg: &OwnedMessage) -> Result<bool, QueueError> {
    let payload = msg.payload().ok_or(QueueError::EmptyPayload)?;
    let envelope = MetricEnvelope::decode(payload)?;
    let timestamp = envelope.data.parse_timestamp()?;

    if store.get_location(&envelope.zipcode).await?.is_none() {
        store
            .upsert_location(&envelope.zipcode, &envelope.city)
            .await?;
    }

    let row = NewRawMetric {
        zipcode: envelope.zipcode,
        timestamp,
        temperature: envelope.data.temperature,
        humidity: envelope.data.humidity,
        precipitation: envelope.data.precipitation,
        wind_speed: envelope.data.wind_speed,
        wind_direction: envelope.data.wind_direction,
        pollution_index: envelope.data.pollution_index,
        pollen_index: envelope.data.pollen_index,
        connection_id: envelope.connection_id,
        received_at: envelope.received_at,
    };
    let fresh = store.insert_raw_metric(&row).await?;
    Ok(fresh)
}
