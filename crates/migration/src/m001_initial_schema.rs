use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(DOWN_SQL).await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS locations (
    zipcode TEXT PRIMARY KEY,
    city_name TEXT NOT NULL,
    lat DOUBLE PRECISION,
    lon DOUBLE PRECISION,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS raw_metrics (
    id BIGSERIAL PRIMARY KEY,
    zipcode TEXT NOT NULL REFERENCES locations(zipcode),
    timestamp TIMESTAMPTZ NOT NULL,
    temperature DOUBLE PRECISION,
    humidity DOUBLE PRECISION,
    precipitation DOUBLE PRECISION,
    wind_speed DOUBLE PRECISION,
    wind_direction TEXT,
    pollution_index DOUBLE PRECISION,
    pollen_index DOUBLE PRECISION,
    connection_id TEXT NOT NULL,
    received_at TIMESTAMPTZ NOT NULL,
    -- Idempotency key: at-least-once redelivery from the log collapses to
    -- one logical row.
    CONSTRAINT raw_metrics_sample_key UNIQUE (zipcode, timestamp, connection_id)
);
CREATE INDEX IF NOT EXISTS idx_raw_metrics_zipcode_ts ON raw_metrics(zipcode, timestamp);
CREATE INDEX IF NOT EXISTS idx_raw_metrics_ts ON raw_metrics(timestamp);

CREATE TABLE IF NOT EXISTS alarm_thresholds (
    id SERIAL PRIMARY KEY,
    zipcode TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    operator TEXT NOT NULL CHECK (operator IN ('>', '<', '>=', '<=')),
    threshold_value DOUBLE PRECISION NOT NULL,
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT alarm_thresholds_location_metric UNIQUE (zipcode, metric_name)
);

CREATE TABLE IF NOT EXISTS alarms_log (
    alarm_id BIGSERIAL PRIMARY KEY,
    zipcode TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    breach_value DOUBLE PRECISION NOT NULL,
    threshold_config TEXT NOT NULL,
    start_time TIMESTAMPTZ NOT NULL,
    end_time TIMESTAMPTZ,
    status TEXT NOT NULL CHECK (status IN ('ACTIVE', 'CLEARED')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_alarms_log_zipcode ON alarms_log(zipcode, metric_name);
-- At most one ACTIVE alarm per (location, metric) at any instant.
CREATE UNIQUE INDEX IF NOT EXISTS idx_alarms_log_one_active
    ON alarms_log(zipcode, metric_name) WHERE status = 'ACTIVE';

CREATE TABLE IF NOT EXISTS hourly_metrics (
    id BIGSERIAL PRIMARY KEY,
    zipcode TEXT NOT NULL,
    hour_timestamp TIMESTAMPTZ NOT NULL,
    avg_temp DOUBLE PRECISION,
    avg_humidity DOUBLE PRECISION,
    avg_precip DOUBLE PRECISION,
    avg_wind DOUBLE PRECISION,
    avg_pollution DOUBLE PRECISION,
    avg_pollen DOUBLE PRECISION,
    sample_count INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT hourly_metrics_bucket UNIQUE (zipcode, hour_timestamp)
);

CREATE TABLE IF NOT EXISTS daily_summary (
    id BIGSERIAL PRIMARY KEY,
    zipcode TEXT NOT NULL,
    date DATE NOT NULL,
    min_temp DOUBLE PRECISION,
    max_temp DOUBLE PRECISION,
    min_humidity DOUBLE PRECISION,
    max_humidity DOUBLE PRECISION,
    min_precip DOUBLE PRECISION,
    max_precip DOUBLE PRECISION,
    min_wind DOUBLE PRECISION,
    max_wind DOUBLE PRECISION,
    min_pollution DOUBLE PRECISION,
    max_pollution DOUBLE PRECISION,
    min_pollen DOUBLE PRECISION,
    max_pollen DOUBLE PRECISION,
    created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT daily_summary_bucket UNIQUE (zipcode, date)
);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS daily_summary;
DROP TABLE IF EXISTS hourly_metrics;
DROP TABLE IF EXISTS alarms_log;
DROP TABLE IF EXISTS alarm_thresholds;
DROP TABLE IF EXISTS raw_metrics;
DROP TABLE IF EXISTS locations;
";
