//! Aggregation service: hourly and daily rollups, self-rescheduled through
//! the scheduled-event manager.

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use skywatch_aggregation::{schedule_daily, schedule_hourly, DailyAggregator, HourlyAggregator};
use skywatch_server::config::Config;
use skywatch_storage::WeatherStore;
use skywatch_timer::TimerManager;
use tokio::signal;

const TIMER_WORKERS: usize = 2;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    skywatch_server::init_tracing()?;

    let config = Config::load()?;
    tracing::info!(
        db = %config.database.redacted_url(),
        daily_time = %config.aggregation.daily_time,
        "skywatch-aggregator starting"
    );

    let store = Arc::new(WeatherStore::connect(&config.database.url()).await?);
    let timers = TimerManager::new(TIMER_WORKERS);
    timers.start();

    let hourly_delay = Duration::from_std(config.aggregation.hourly_delay)
        .map_err(|e| anyhow::anyhow!("invalid AGGREGATION_HOURLY_DELAY: {e}"))?;
    schedule_hourly(
        &timers,
        Arc::new(HourlyAggregator::new(store.clone())),
        hourly_delay,
    );
    schedule_daily(
        &timers,
        Arc::new(DailyAggregator::new(store)),
        config.aggregation.daily_time.clone(),
    );

    tracing::info!("skywatch-aggregator running, Ctrl+C to stop");
    signal::ctrl_c().await?;
    tracing::info!("shutting down gracefully");

    timers.stop().await;
    tracing::info!("skywatch-aggregator stopped");
    Ok(())
}
