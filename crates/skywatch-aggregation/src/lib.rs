//! Scheduled rollups: raw samples are averaged into hourly buckets shortly
//! after each hour closes, and hourly buckets are folded into daily min/max
//! summaries once a day. Both jobs reschedule themselves through the
//! scheduled-event manager.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc};
use skywatch_storage::{StorageError, WeatherStore};
use skywatch_timer::TimerManager;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("aggregation: storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("aggregation: invalid daily run time '{0}' (expected HH:MM)")]
    InvalidDailyTime(String),
}

fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::minutes(i64::from(t.minute()))
        - Duration::seconds(i64::from(t.second()))
        - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Convert a wall-clock instant to a monotonic deadline. Instants already in
/// the past fire immediately.
fn deadline_for(when: DateTime<Utc>) -> Instant {
    let delta = (when - Utc::now()).to_std().unwrap_or_default();
    Instant::now() + delta
}

/// Averages raw samples into `hourly_metrics`, one bucket per zipcode per
/// hour.
pub struct HourlyAggregator {
    store: Arc<WeatherStore>,
}

impl HourlyAggregator {
    pub fn new(store: Arc<WeatherStore>) -> Self {
        Self { store }
    }

    pub async fn aggregate(&self, target_hour: DateTime<Utc>) -> Result<u64, AggregationError> {
        let start = truncate_to_hour(target_hour);
        let end = start + Duration::hours(1);
        tracing::info!(hour = %start, "running hourly aggregation");
        let zipcodes = self.store.rollup_hourly(start, end).await?;
        tracing::info!(hour = %start, zipcodes, "hourly aggregation completed");
        Ok(zipcodes)
    }

    pub async fn aggregate_previous_hour(&self) -> Result<u64, AggregationError> {
        self.aggregate(Utc::now() - Duration::hours(1)).await
    }

    /// Next run: `delay` past the top of the next hour.
    pub fn next_run_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
        let next_hour = truncate_to_hour(now) + Duration::hours(1);
        let mut next_run = next_hour + delay;
        if now > next_run {
            next_run += Duration::hours(1);
        }
        next_run
    }
}

/// Folds hourly buckets into `daily_summary` min/max rows.
pub struct DailyAggregator {
    store: Arc<WeatherStore>,
}

impl DailyAggregator {
    pub fn new(store: Arc<WeatherStore>) -> Self {
        Self { store }
    }

    pub async fn aggregate(&self, target_day: DateTime<Utc>) -> Result<u64, AggregationError> {
        let date = target_day.date_naive();
        tracing::info!(%date, "running daily aggregation");
        let zipcodes = self.store.rollup_daily(date).await?;
        tracing::info!(%date, zipcodes, "daily aggregation completed");
        Ok(zipcodes)
    }

    pub async fn aggregate_previous_day(&self) -> Result<u64, AggregationError> {
        self.aggregate(Utc::now() - Duration::days(1)).await
    }

    /// Next run: `time_of_day` (HH:MM, UTC) today, or tomorrow if that has
    /// already passed.
    pub fn next_run_at(
        now: DateTime<Utc>,
        time_of_day: &str,
    ) -> Result<DateTime<Utc>, AggregationError> {
        let time = NaiveTime::parse_from_str(time_of_day, "%H:%M")
            .map_err(|_| AggregationError::InvalidDailyTime(time_of_day.to_string()))?;

        let today = now.date_naive().and_time(time);
        let today_run = Utc.from_utc_datetime(&today);
        if now > today_run {
            Ok(today_run + Duration::days(1))
        } else {
            Ok(today_run)
        }
    }
}

const HOURLY_TASK_ID: &str = "hourly-aggregation";
const DAILY_TASK_ID: &str = "daily-aggregation";

/// Arm the hourly job; each run schedules the next one.
pub fn schedule_hourly(
    timers: &Arc<TimerManager>,
    aggregator: Arc<HourlyAggregator>,
    delay: Duration,
) {
    let next_run = HourlyAggregator::next_run_after(Utc::now(), delay);
    tracing::info!(next_run = %next_run, "hourly aggregation scheduled");

    let timers_for_cb = timers.clone();
    let callback = Box::new(move || {
        tokio::spawn(async move {
            if let Err(e) = aggregator.aggregate_previous_hour().await {
                tracing::error!(error = %e, "hourly aggregation failed");
            }
            schedule_hourly(&timers_for_cb, aggregator, delay);
        });
    });

    if let Err(e) = timers.schedule(HOURLY_TASK_ID, deadline_for(next_run), callback) {
        tracing::warn!(error = %e, "could not schedule hourly aggregation");
    }
}

/// Arm the daily job; each run schedules the next one.
pub fn schedule_daily(
    timers: &Arc<TimerManager>,
    aggregator: Arc<DailyAggregator>,
    time_of_day: String,
) {
    let next_run = match DailyAggregator::next_run_at(Utc::now(), &time_of_day) {
        Ok(next_run) => next_run,
        Err(e) => {
            tracing::error!(error = %e, "daily aggregation disabled");
            return;
        }
    };
    tracing::info!(next_run = %next_run, "daily aggregation scheduled");

    let timers_for_cb = timers.clone();
    let callback = Box::new(move || {
        tokio::spawn(async move {
            if let Err(e) = aggregator.aggregate_previous_day().await {
                tracing::error!(error = %e, "daily aggregation failed");
            }
            schedule_daily(&timers_for_cb, aggregator, time_of_day);
        });
    });

    if let Err(e) = timers.schedule(DAILY_TASK_ID, deadline_for(next_run), callback) {
        tracing::warn!(error = %e, "could not schedule daily aggregation");
    }
}
