use skywatch_storage::StorageError;

/// Errors raised while evaluating samples against thresholds.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    /// Reading thresholds or writing the alarm log failed. These propagate so
    /// the sample's offset is not committed and the record is redelivered.
    #[error("alarming: storage error: {0}")]
    Storage(#[from] StorageError),

    /// The shared state cache could not be reached or returned malformed
    /// state. Callers degrade to CLEAR rather than abort evaluation.
    #[error("alarming: state store unavailable: {0}")]
    State(String),

    /// Serializing state or an alarm event failed.
    #[error("alarming: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
