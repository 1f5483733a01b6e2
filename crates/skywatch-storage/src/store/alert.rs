use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use skywatch_common::types::MetricName;

use crate::entities::alarm_log;
use crate::entities::alarm_threshold::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::WeatherStore;
use crate::AlarmStore;

pub const ALARM_STATUS_ACTIVE: &str = "ACTIVE";
pub const ALARM_STATUS_CLEARED: &str = "CLEARED";

/// An alarm threshold as configured for one (location, metric) pair.
///
/// Serializable so the evaluator can snapshot the exact configuration into
/// the alarm-log row that it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub id: i32,
    pub zipcode: String,
    pub metric_name: MetricName,
    pub operator: String,
    pub threshold_value: f64,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A new ACTIVE audit row for a fired alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlarmLog {
    pub zipcode: String,
    pub metric_name: MetricName,
    pub breach_value: f64,
    pub threshold_config: String,
    pub start_time: DateTime<Utc>,
}

fn to_row(m: alarm_threshold::Model) -> Result<ThresholdRow> {
    let metric_name = m
        .metric_name
        .parse::<MetricName>()
        .map_err(|_| StorageError::UnexpectedValue {
            column: "metric_name",
            value: m.metric_name.clone(),
        })?;
    Ok(ThresholdRow {
        id: m.id,
        zipcode: m.zipcode,
        metric_name,
        operator: m.operator,
        threshold_value: m.threshold_value,
        duration_minutes: m.duration_minutes,
        is_active: m.is_active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl WeatherStore {
    pub async fn active_thresholds(&self, zipcode: &str) -> Result<Vec<ThresholdRow>> {
        let models = Entity::find()
            .filter(Column::Zipcode.eq(zipcode))
            .filter(Column::IsActive.eq(true))
            .order_by(Column::MetricName, Order::Asc)
            .all(self.db())
            .await?;
        models.into_iter().map(to_row).collect()
    }

    pub async fn insert_alarm_log(&self, row: &NewAlarmLog) -> Result<i64> {
        let now = Utc::now().fixed_offset();
        let am = alarm_log::ActiveModel {
            zipcode: Set(row.zipcode.clone()),
            metric_name: Set(row.metric_name.to_string()),
            breach_value: Set(row.breach_value),
            threshold_config: Set(row.threshold_config.clone()),
            start_time: Set(row.start_time.fixed_offset()),
            end_time: Set(None),
            status: Set(ALARM_STATUS_ACTIVE.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = am.insert(self.db()).await?;
        Ok(model.alarm_id)
    }

    pub async fn mark_alarm_cleared(&self, alarm_id: i64, end_time: DateTime<Utc>) -> Result<()> {
        let model = alarm_log::Entity::find_by_id(alarm_id)
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "alarm_log",
                id: alarm_id.to_string(),
            })?;

        let mut am: alarm_log::ActiveModel = model.into();
        am.status = Set(ALARM_STATUS_CLEARED.to_string());
        am.end_time = Set(Some(end_time.fixed_offset()));
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(())
    }
}

#[async_trait]
impl AlarmStore for WeatherStore {
    async fn active_thresholds(&self, zipcode: &str) -> Result<Vec<ThresholdRow>> {
        WeatherStore::active_thresholds(self, zipcode).await
    }

    async fn insert_alarm_log(&self, row: &NewAlarmLog) -> Result<i64> {
        WeatherStore::insert_alarm_log(self, row).await
    }

    async fn mark_alarm_cleared(&self, alarm_id: i64, end_time: DateTime<Utc>) -> Result<()> {
        WeatherStore::mark_alarm_cleared(self, alarm_id, end_time).await
    }
}
