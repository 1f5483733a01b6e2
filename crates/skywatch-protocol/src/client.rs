use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skywatch_common::types::{MetricName, WindDirection};

use crate::error::ProtocolError;

/// A weather measurement as submitted by a station. Every numeric field may
/// be absent (a failed sensor reports nothing for that channel).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricData {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<WindDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pollution_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pollen_index: Option<f64>,
}

impl MetricData {
    /// Parse the client-supplied timestamp.
    pub fn parse_timestamp(&self) -> Result<DateTime<Utc>, ProtocolError> {
        if self.timestamp.is_empty() {
            return Err(ProtocolError::MissingTimestamp);
        }
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|source| ProtocolError::InvalidTimestamp {
                value: self.timestamp.clone(),
                source,
            })
    }

    /// Look up a numeric channel by metric name. Absent values stay absent.
    pub fn metric_value(&self, metric: MetricName) -> Option<f64> {
        match metric {
            MetricName::Temperature => self.temperature,
            MetricName::Humidity => self.humidity,
            MetricName::Precipitation => self.precipitation,
            MetricName::WindSpeed => self.wind_speed,
            MetricName::PollutionIndex => self.pollution_index,
            MetricName::PollenIndex => self.pollen_index,
        }
    }
}

/// First frame of every session; declares which station is connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyFrame {
    pub zipcode: String,
    pub city: String,
}

/// A periodic measurement push.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsFrame {
    pub data: MetricData,
}

/// A parsed client-to-server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Identify(IdentifyFrame),
    Metrics(MetricsFrame),
    Keepalive,
}

impl ClientFrame {
    /// Encode the frame as a single JSON line (newline included).
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            ClientFrame::Identify(f) => encode_line(&IdentifyWire {
                kind: MSG_IDENTIFY.to_string(),
                zipcode: f.zipcode.clone(),
                city: f.city.clone(),
            }),
            ClientFrame::Metrics(f) => encode_line(&MetricsWire {
                kind: MSG_METRICS.to_string(),
                data: f.data.clone(),
            }),
            ClientFrame::Keepalive => encode_line(&HeaderWire {
                kind: MSG_KEEPALIVE.to_string(),
            }),
        }
    }
}

/// Server-to-client acknowledgment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Identified,
    Alive,
    Error,
}

/// The only server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: AckStatus,
}

impl Ack {
    pub fn new(status: AckStatus) -> Self {
        Self {
            kind: MSG_ACK.to_string(),
            status,
        }
    }
}

const MSG_IDENTIFY: &str = "identify";
const MSG_METRICS: &str = "metrics";
const MSG_KEEPALIVE: &str = "keepalive";
const MSG_ACK: &str = "ack";

#[derive(Deserialize, Serialize)]
struct HeaderWire {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize, Serialize)]
struct IdentifyWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    zipcode: String,
    #[serde(default)]
    city: String,
}

#[derive(Deserialize, Serialize)]
struct MetricsWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: MetricData,
}

/// Parse one newline-framed JSON message.
///
/// Parsing is two-phase: the `type` discriminator is read first, then the
/// concrete shape is decoded and validated. Unknown fields are ignored.
pub fn parse_frame(data: &[u8]) -> Result<ClientFrame, ProtocolError> {
    let header: HeaderWire = serde_json::from_slice(data)?;

    match header.kind.as_str() {
        MSG_IDENTIFY => {
            let wire: IdentifyWire = serde_json::from_slice(data)?;
            if wire.zipcode.is_empty() {
                return Err(ProtocolError::MissingIdentityField("zipcode"));
            }
            if wire.city.is_empty() {
                return Err(ProtocolError::MissingIdentityField("city"));
            }
            Ok(ClientFrame::Identify(IdentifyFrame {
                zipcode: wire.zipcode,
                city: wire.city,
            }))
        }
        MSG_METRICS => {
            let wire: MetricsWire = serde_json::from_slice(data)?;
            wire.data.parse_timestamp()?;
            Ok(ClientFrame::Metrics(MetricsFrame { data: wire.data }))
        }
        MSG_KEEPALIVE => Ok(ClientFrame::Keepalive),
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

/// Serialize a message and terminate it with the frame delimiter.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut line = serde_json::to_vec(msg)?;
    line.push(b'\n');
    Ok(line)
}
