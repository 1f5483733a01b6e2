use sea_orm::entity::prelude::*;

/// Audit row for one alarm episode. `threshold_config` is an immutable JSON
/// snapshot of the threshold as it stood when the alarm fired.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "alarms_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub alarm_id: i64,
    pub zipcode: String,
    pub metric_name: String,
    pub breach_value: f64,
    pub threshold_config: String,
    pub start_time: DateTimeWithTimeZone,
    pub end_time: Option<DateTimeWithTimeZone>,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
