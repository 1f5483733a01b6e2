use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "hourly_metrics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub zipcode: String,
    pub hour_timestamp: DateTimeWithTimeZone,
    pub avg_temp: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_precip: Option<f64>,
    pub avg_wind: Option<f64>,
    pub avg_pollution: Option<f64>,
    pub avg_pollen: Option<f64>,
    pub sample_count: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
