use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skywatch_common::types::MetricName;

use crate::client::MetricData;
use crate::error::ProtocolError;

/// The record published onto the raw-metric topic, keyed by zipcode.
/// Consumers ignore fields they do not recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEnvelope {
    pub connection_id: String,
    pub zipcode: String,
    pub city: String,
    pub received_at: DateTime<Utc>,
    pub data: MetricData,
}

impl MetricEnvelope {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmEventKind {
    #[serde(rename = "ALARM_TRIGGERED")]
    Triggered,
    #[serde(rename = "ALARM_CLEARED")]
    Cleared,
}

/// An alarm transition published onto the alarm topic.
///
/// `value` is the breaching measurement and is present on triggered events;
/// `alarm_id` refers to the audit row and may be absent on cleared events
/// when the evaluator lost track of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    #[serde(rename = "type")]
    pub kind: AlarmEventKind,
    pub zipcode: String,
    pub city: String,
    pub metric: MetricName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub threshold: f64,
    pub operator: String,
    pub duration_minutes: i32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_id: Option<i64>,
}

impl AlarmEvent {
    /// Routing key: all transitions for one (location, metric) pair share a
    /// partition and are observed in order.
    pub fn partition_key(&self) -> String {
        format!("{}-{}", self.zipcode, self.metric)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(data)?)
    }
}
