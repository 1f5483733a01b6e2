use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, EntityTrait};
use skywatch_common::types::WindDirection;

use crate::entities::raw_metric::{self, Column, Entity};
use crate::error::Result;
use crate::store::WeatherStore;

/// A raw sample ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRawMetric {
    pub zipcode: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<WindDirection>,
    pub pollution_index: Option<f64>,
    pub pollen_index: Option<f64>,
    pub connection_id: String,
    pub received_at: DateTime<Utc>,
}

impl WeatherStore {
    /// Idempotent insert keyed on `(zipcode, timestamp, connection_id)`:
    /// redelivered records hit the conflict target and affect no rows.
    pub async fn insert_raw_metric(&self, row: &NewRawMetric) -> Result<bool> {
        let am = raw_metric::ActiveModel {
            zipcode: Set(row.zipcode.clone()),
            timestamp: Set(row.timestamp.fixed_offset()),
            temperature: Set(row.temperature),
            humidity: Set(row.humidity),
            precipitation: Set(row.precipitation),
            wind_speed: Set(row.wind_speed),
            wind_direction: Set(row.wind_direction.map(|d| d.as_str().to_string())),
            pollution_index: Set(row.pollution_index),
            pollen_index: Set(row.pollen_index),
            connection_id: Set(row.connection_id.clone()),
            received_at: Set(row.received_at.fixed_offset()),
            ..Default::default()
        };

        let inserted = Entity::insert(am)
            .on_conflict(
                OnConflict::columns([Column::Zipcode, Column::Timestamp, Column::ConnectionId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;
        Ok(inserted > 0)
    }
}
