/// Errors raised by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying database error.
    #[error("storage: database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// A required record was not found.
    #[error("storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A column held a value the domain type cannot represent, e.g. an
    /// unknown metric name in an alarm threshold.
    #[error("storage: unexpected value in column '{column}': {value}")]
    UnexpectedValue { column: &'static str, value: String },

    /// JSON serialization of a stored document failed.
    #[error("storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
