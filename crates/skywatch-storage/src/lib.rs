//! Relational store for the pipeline: locations, raw samples, alarm
//! thresholds, the alarm audit log and the rollup tables, accessed through
//! SeaORM over PostgreSQL.

pub mod entities;
pub mod error;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use error::StorageError;
pub use store::WeatherStore;
pub use store::{LocationRow, NewAlarmLog, NewRawMetric, ThresholdRow};

/// Persistence operations needed by the batched sample writer.
#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn get_location(&self, zipcode: &str) -> Result<Option<LocationRow>, StorageError>;

    /// Create or refresh the minimal location row for a zipcode.
    async fn upsert_location(&self, zipcode: &str, city: &str) -> Result<(), StorageError>;

    /// Insert one raw sample. Returns `false` when the row already existed
    /// (redelivered record); the write is idempotent either way.
    async fn insert_raw_metric(&self, row: &NewRawMetric) -> Result<bool, StorageError>;
}

/// Persistence operations needed by the alarm evaluator.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Active thresholds configured for a zipcode.
    async fn active_thresholds(&self, zipcode: &str) -> Result<Vec<ThresholdRow>, StorageError>;

    /// Append an ACTIVE alarm-log row and return its id.
    async fn insert_alarm_log(&self, row: &NewAlarmLog) -> Result<i64, StorageError>;

    /// Close an alarm-log row: status CLEARED, end time recorded.
    async fn mark_alarm_cleared(
        &self,
        alarm_id: i64,
        end_time: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}
