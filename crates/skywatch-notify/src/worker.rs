use std::sync::Arc;

use rdkafka::message::Message;
use skywatch_protocol::AlarmEvent;
use skywatch_queue::{Committer, Consumer};
use tokio_util::sync::CancellationToken;

use crate::email::EmailNotifier;

/// Consumes the alarm topic and emails every transition. A failed send
/// leaves the offset uncommitted so the event is redelivered; undecodable
/// records are committed as poison.
pub struct NotifyWorker {
    consumer: Arc<Consumer>,
    notifier: Arc<EmailNotifier>,
}

impl NotifyWorker {
    pub fn new(consumer: Arc<Consumer>, notifier: Arc<EmailNotifier>) -> Self {
        Self { consumer, notifier }
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

            let event = match msg.payload().map(AlarmEvent::decode) {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::warn!(offset = msg.offset(), error = %e, "undecodable alarm event, committing past it");
                    self.commit(&msg);
                    continue;
                }
                None => {
                    tracing::warn!(offset = msg.offset(), "empty alarm event, committing past it");
                    self.commit(&msg);
                    continue;
                }
            };

            match self.notifier.send_alarm_event(&event).await {
                Ok(()) => self.commit(&msg),
                Err(e) => {
                    tracing::error!(
                        zipcode = %event.zipcode,
                        metric = %event.metric,
                        error = %e,
                        "notification failed, leaving offset for redelivery"
                    );
                }
            }
        }
        tracing::info!("notification worker stopped");
    }

    fn commit(&self, msg: &rdkafka::message::OwnedMessage) {
        if let Err(e) = self.consumer.commit(msg) {
            tracing::error!(offset = msg.offset(), error = %e, "offset commit failed");
        }
    }
}
