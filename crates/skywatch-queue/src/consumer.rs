use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as KafkaConsumer, StreamConsumer};
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::{Offset, TopicPartitionList};

use crate::error::QueueError;

/// Commits the offset of a specific record. Split from [`Consumer`] so the
/// persistence worker's commit-after-write contract can be exercised without
/// a broker.
pub trait Committer: Send + Sync {
    fn commit(&self, msg: &OwnedMessage) -> Result<(), QueueError>;
}

/// Group member on one topic. Offsets are never auto-committed and the
/// consumer starts at the tail; callers commit each record explicitly after
/// its side effect has succeeded.
pub struct Consumer {
    inner: StreamConsumer,
}

impl Consumer {
    pub fn new(brokers: &str, topic: &str, group_id: &str) -> Result<Self, QueueError> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "latest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .create()?;
        inner.subscribe(&[topic])?;
        Ok(Self { inner })
    }

    /// Block until the next record arrives. Callers bound this with their
    /// cancellation token.
    pub async fn fetch(&self) -> Result<OwnedMessage, QueueError> {
        let message = self.inner.recv().await?;
        Ok(message.detach())
    }
}

impl Committer for Consumer {
    fn commit(&self, msg: &OwnedMessage) -> Result<(), QueueError> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(msg.topic(), msg.partition(), Offset::Offset(msg.offset() + 1))?;
        self.inner.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }
}
