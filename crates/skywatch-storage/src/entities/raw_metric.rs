use sea_orm::entity::prelude::*;

/// One five-minute weather sample as received from a station. The
/// `(zipcode, timestamp, connection_id)` key absorbs at-least-once
/// redelivery from the log.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "raw_metrics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub zipcode: String,
    pub timestamp: DateTimeWithTimeZone,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    pub pollution_index: Option<f64>,
    pub pollen_index: Option<f64>,
    pub connection_id: String,
    pub received_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
