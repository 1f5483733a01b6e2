/// Errors raised while parsing or validating protocol frames and log records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not a valid JSON object.
    #[error("protocol: invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The `type` discriminator names no known message shape.
    #[error("protocol: unknown message type '{0}'")]
    UnknownType(String),

    /// An identify frame omitted a required identity field.
    #[error("protocol: identify requires a non-empty {0}")]
    MissingIdentityField(&'static str),

    /// A metrics frame carried no client timestamp.
    #[error("protocol: metrics frame is missing a timestamp")]
    MissingTimestamp,

    /// The client timestamp is not RFC-3339.
    #[error("protocol: invalid RFC-3339 timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}
