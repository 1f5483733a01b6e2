use skywatch_storage::StorageError;

/// Errors raised by the log client and the persistence worker.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// An underlying client or broker error.
    #[error("queue: kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A fetched record carried no payload.
    #[error("queue: record has an empty payload")]
    EmptyPayload,

    /// A fetched record's value failed to decode.
    #[error("queue: record decode failed: {0}")]
    Decode(#[from] skywatch_protocol::ProtocolError),

    /// Writing a decoded record to the relational store failed.
    #[error("queue: storage write failed: {0}")]
    Storage(#[from] StorageError),
}
