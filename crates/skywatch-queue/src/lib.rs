//! Partitioned-log client: a batched, compressed, optionally-async producer,
//! a manual-commit consumer-group reader, and the batched persistence worker
//! that drains the raw-metric topic into the relational store.

mod batch_writer;
mod consumer;
mod error;
mod producer;

use async_trait::async_trait;

pub use batch_writer::{BatchWriter, BatchWriterConfig};
pub use consumer::{Committer, Consumer};
pub use error::QueueError;
pub use producer::{partition_for_key, Compression, Producer, ProducerConfig, RequiredAcks};

/// Keyed publish onto a topic. Ordering is preserved per key (the partition
/// balancer hashes the key), not globally.
///
/// The concrete [`Producer`] talks to the broker; tests substitute
/// channel-backed fakes.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests;
