use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, DbBackend, Statement};

use crate::error::Result;
use crate::store::WeatherStore;

const HOURLY_ROLLUP_SQL: &str = r#"
INSERT INTO hourly_metrics (
    zipcode, hour_timestamp, avg_temp, avg_humidity, avg_precip,
    avg_wind, avg_pollution, avg_pollen, sample_count
)
SELECT
    zipcode,
    $1 AS hour_timestamp,
    AVG(temperature) AS avg_temp,
    AVG(humidity) AS avg_humidity,
    AVG(precipitation) AS avg_precip,
    AVG(wind_speed) AS avg_wind,
    AVG(pollution_index) AS avg_pollution,
    AVG(pollen_index) AS avg_pollen,
    COUNT(*) AS sample_count
FROM raw_metrics
WHERE timestamp >= $1 AND timestamp < $2
GROUP BY zipcode
ON CONFLICT (zipcode, hour_timestamp) DO UPDATE
SET avg_temp = EXCLUDED.avg_temp,
    avg_humidity = EXCLUDED.avg_humidity,
    avg_precip = EXCLUDED.avg_precip,
    avg_wind = EXCLUDED.avg_wind,
    avg_pollution = EXCLUDED.avg_pollution,
    avg_pollen = EXCLUDED.avg_pollen,
    sample_count = EXCLUDED.sample_count
"#;

const DAILY_ROLLUP_SQL: &str = r#"
INSERT INTO daily_summary (
    zipcode, date,
    min_temp, max_temp,
    min_humidity, max_humidity,
    min_precip, max_precip,
    min_wind, max_wind,
    min_pollution, max_pollution,
    min_pollen, max_pollen
)
SELECT
    zipcode,
    $1::date AS date,
    MIN(avg_temp), MAX(avg_temp),
    MIN(avg_humidity), MAX(avg_humidity),
    MIN(avg_precip), MAX(avg_precip),
    MIN(avg_wind), MAX(avg_wind),
    MIN(avg_pollution), MAX(avg_pollution),
    MIN(avg_pollen), MAX(avg_pollen)
FROM hourly_metrics
WHERE hour_timestamp >= $1::date AND hour_timestamp < $1::date + INTERVAL '1 day'
GROUP BY zipcode
ON CONFLICT (zipcode, date) DO UPDATE
SET min_temp = EXCLUDED.min_temp,
    max_temp = EXCLUDED.max_temp,
    min_humidity = EXCLUDED.min_humidity,
    max_humidity = EXCLUDED.max_humidity,
    min_precip = EXCLUDED.min_precip,
    max_precip = EXCLUDED.max_precip,
    min_wind = EXCLUDED.min_wind,
    max_wind = EXCLUDED.max_wind,
    min_pollution = EXCLUDED.min_pollution,
    max_pollution = EXCLUDED.max_pollution,
    min_pollen = EXCLUDED.min_pollen,
    max_pollen = EXCLUDED.max_pollen
"#;

impl WeatherStore {
    /// Roll raw samples in `[hour_start, hour_end)` up into per-zipcode
    /// hourly averages. Returns the number of zipcodes written.
    pub async fn rollup_hourly(
        &self,
        hour_start: DateTime<Utc>,
        hour_end: DateTime<Utc>,
    ) -> Result<u64> {
        let result = self
            .db()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                HOURLY_ROLLUP_SQL,
                [hour_start.into(), hour_end.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    /// Roll one day's hourly averages up into per-zipcode min/max summaries.
    pub async fn rollup_daily(&self, date: NaiveDate) -> Result<u64> {
        let result = self
            .db()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                DAILY_ROLLUP_SQL,
                [date.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }
}
