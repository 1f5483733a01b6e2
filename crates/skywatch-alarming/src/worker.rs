use std::sync::Arc;

use rdkafka::message::Message;
use skywatch_protocol::MetricEnvelope;
use skywatch_queue::{Committer, Consumer};
use tokio_util::sync::CancellationToken;

use crate::evaluator::Evaluator;

/// Consumes the raw-metric topic and runs every sample through the
/// evaluator. Offsets are committed only after a successful evaluation;
/// undecodable records are committed as poison.
pub struct AlarmWorker {
    consumer: Arc<Consumer>,
    evaluator: Arc<Evaluator>,
}

impl AlarmWorker {
    pub fn new(consumer: Arc<Consumer>, evaluator: Arc<Evaluator>) -> Self {
        Self {
            consumer,
            evaluator,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                fetched = self.consumer.fetch() => match fetched {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::error!(error = %e, "consumer fetch failed");
                        continue;
                    }
                }
            };

            let envelope = match msg.payload().map(MetricEnvelope::decode) {
                Some(Ok(envelope)) => envelope,
                Some(Err(e)) => {
                    tracing::warn!(
                        offset = msg.offset(),
                        error = %e,
                        "undecodable sample, committing past it"
                    );
                    self.commit(&msg);
                    continue;
                }
                None => {
                    tracing::warn!(offset = msg.offset(), "empty sample, committing past it");
                    self.commit(&msg);
                    continue;
                }
            };

            match self.evaluator.evaluate(&envelope).await {
                Ok(()) => self.commit(&msg),
                Err(e) => {
                    // Leave the offset uncommitted; the sample is redelivered.
                    tracing::error!(
                        zipcode = %envelope.zipcode,
                        offset = msg.offset(),
                        error = %e,
                        "evaluation failed"
                    );
                }
            }
        }
        tracing::info!("alarm worker stopped");
    }

    fn commit(&self, msg: &rdkafka::message::OwnedMessage) {
        if let Err(e) = self.consumer.commit(msg) {
            tracing::error!(offset = msg.offset(), error = %e, "offset commit failed");
        }
    }
}
