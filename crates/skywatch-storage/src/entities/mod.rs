pub mod alarm_log;
pub mod alarm_threshold;
pub mod daily_summary;
pub mod hourly_metric;
pub mod location;
pub mod raw_metric;
