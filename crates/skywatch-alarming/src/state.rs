use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use skywatch_common::types::MetricName;

use crate::error::AlarmError;

/// States auto-expire after a week so abandoned stations clean themselves up.
const STATE_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmPhase {
    Pending,
    Active,
}

/// Stored alarm state for one (location, metric) pair. CLEAR is represented
/// by the absence of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmState {
    pub phase: AlarmPhase,
    pub breach_start: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    pub last_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_id: Option<i64>,
}

/// Shared state store for the evaluators. Instances in one consumer group
/// own disjoint partitions and therefore disjoint keys.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(
        &self,
        zipcode: &str,
        metric: MetricName,
    ) -> Result<Option<AlarmState>, AlarmError>;

    async fn set(
        &self,
        zipcode: &str,
        metric: MetricName,
        state: &AlarmState,
    ) -> Result<(), AlarmError>;

    async fn delete(&self, zipcode: &str, metric: MetricName) -> Result<(), AlarmError>;
}

fn state_key(zipcode: &str, metric: MetricName) -> String {
    format!("alarm_state:{zipcode}:{metric}")
}

/// Redis-backed state store with JSON-encoded records and a 7-day TTL.
pub struct RedisStateStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStateStore {
    /// Connect and verify the server responds.
    pub async fn connect(url: &str) -> Result<Self, AlarmError> {
        let client = redis::Client::open(url).map_err(|e| AlarmError::State(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| AlarmError::State(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(
        &self,
        zipcode: &str,
        metric: MetricName,
    ) -> Result<Option<AlarmState>, AlarmError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(state_key(zipcode, metric))
            .await
            .map_err(|e| AlarmError::State(e.to_string()))?;
        match raw {
            None => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        }
    }

    async fn set(
        &self,
        zipcode: &str,
        metric: MetricName,
        state: &AlarmState,
    ) -> Result<(), AlarmError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(state)?;
        conn.set_ex::<_, _, ()>(state_key(zipcode, metric), payload, STATE_TTL_SECS)
            .await
            .map_err(|e| AlarmError::State(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, zipcode: &str, metric: MetricName) -> Result<(), AlarmError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(state_key(zipcode, metric))
            .await
            .map_err(|e| AlarmError::State(e.to_string()))?;
        Ok(())
    }
}
