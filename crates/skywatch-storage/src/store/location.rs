use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, EntityTrait};

use crate::entities::location::{self, Column, Entity};
use crate::error::Result;
use crate::store::WeatherStore;
use crate::SampleStore;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub zipcode: String,
    pub city_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: location::Model) -> LocationRow {
    LocationRow {
        zipcode: m.zipcode,
        city_name: m.city_name,
        lat: m.lat,
        lon: m.lon,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl WeatherStore {
    pub async fn get_location(&self, zipcode: &str) -> Result<Option<LocationRow>> {
        let model = Entity::find_by_id(zipcode).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    pub async fn upsert_location(&self, zipcode: &str, city: &str) -> Result<()> {
        let now = Utc::now().fixed_offset();
        let am = location::ActiveModel {
            zipcode: Set(zipcode.to_string()),
            city_name: Set(city.to_string()),
            lat: Set(None),
            lon: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Entity::insert(am)
            .on_conflict(
                OnConflict::column(Column::Zipcode)
                    .update_columns([Column::CityName, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SampleStore for WeatherStore {
    async fn get_location(&self, zipcode: &str) -> Result<Option<LocationRow>> {
        WeatherStore::get_location(self, zipcode).await
    }

    async fn upsert_location(&self, zipcode: &str, city: &str) -> Result<()> {
        WeatherStore::upsert_location(self, zipcode, city).await
    }

    async fn insert_raw_metric(&self, row: &crate::NewRawMetric) -> Result<bool> {
        WeatherStore::insert_raw_metric(self, row).await
    }
}
