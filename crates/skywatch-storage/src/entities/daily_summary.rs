use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_summary")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub zipcode: String,
    pub date: Date,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_humidity: Option<f64>,
    pub max_humidity: Option<f64>,
    pub min_precip: Option<f64>,
    pub max_precip: Option<f64>,
    pub min_wind: Option<f64>,
    pub max_wind: Option<f64>,
    pub min_pollution: Option<f64>,
    pub max_pollution: Option<f64>,
    pub min_pollen: Option<f64>,
    pub max_pollen: Option<f64>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
