//! Wire formats for the ingestion pipeline: the newline-framed JSON protocol
//! spoken by sensor clients and the record shapes published onto the
//! raw-metric and alarm topics.

mod client;
mod error;
mod records;

pub use client::{
    encode_line, parse_frame, Ack, AckStatus, ClientFrame, IdentifyFrame, MetricData,
    MetricsFrame,
};
pub use error::ProtocolError;
pub use records::{AlarmEvent, AlarmEventKind, MetricEnvelope};

#[cfg(test)]
mod tests;
