//! Environment-driven configuration for every process in the pipeline.
//!
//! All knobs are plain environment variables (a `.env` file is honored when
//! present). Durations are integer seconds except `BATCH_TIMEOUT`, which is
//! milliseconds to match its sub-second default.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use skywatch_queue::{Compression, ProducerConfig, RequiredAcks};

/// Consumer group of the persistence workers.
pub const DB_WRITER_GROUP: &str = "db-writer-group";
/// Consumer group of the alarm evaluators.
pub const ALARMING_GROUP: &str = "alarming-group";
/// Consumer group of the notification workers.
pub const NOTIFICATION_GROUP: &str = "notification-group";

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub tcp: TcpServerConfig,
    pub aggregation: AggregationConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.dbname, self.sslmode
        )
    }

    /// Connection string with the password masked, for logging.
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:****@{}:{}/{}?sslmode={}",
            self.user, self.host, self.port, self.dbname, self.sslmode
        )
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic_metrics: String,
    pub topic_alarms: String,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub compression: Compression,
    pub async_publish: bool,
    pub max_attempts: u32,
    pub required_acks: RequiredAcks,
}

impl KafkaConfig {
    /// Producer settings for a topic, carrying this process's tuning.
    pub fn producer_config(&self, topic: &str) -> ProducerConfig {
        let mut config = ProducerConfig::new(self.brokers.clone(), topic);
        config.batch_size = self.batch_size;
        config.batch_timeout = self.batch_timeout;
        config.compression = self.compression;
        config.async_publish = self.async_publish;
        config.max_attempts = self.max_attempts;
        config.required_acks = self.required_acks;
        config
    }
}

#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    pub port: u16,
    pub max_connections: usize,
    pub identify_timeout: Duration,
    pub inactivity_timeout: Duration,
    /// 0 means auto: 4 × CPU cores.
    pub worker_count: usize,
    pub job_queue_size: usize,
    pub use_worker_pool: bool,
}

impl TcpServerConfig {
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get() * 4
        } else {
            self.worker_count
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub hourly_delay: Duration,
    /// HH:MM, UTC.
    pub daily_time: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl Config {
    /// Read the full configuration from the environment.
    pub fn load() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_parse("DB_PORT", 5432)?,
                user: env_or("DB_USER", "weather_user"),
                password: env_or("DB_PASSWORD", "weather_pass"),
                dbname: env_or("DB_NAME", "weather_db"),
                sslmode: env_or("DB_SSLMODE", "disable"),
            },
            redis: RedisConfig {
                url: env_or("REDIS_URL", "redis://localhost:6379/0"),
            },
            kafka: KafkaConfig {
                brokers: env_or("KAFKA_BROKERS", "localhost:9092"),
                topic_metrics: env_or("KAFKA_TOPIC_METRICS", "weather.metrics.raw"),
                topic_alarms: env_or("KAFKA_TOPIC_ALARMS", "weather.alarms"),
                batch_size: env_parse("BATCH_SIZE", 100)?,
                batch_timeout: Duration::from_millis(env_parse("BATCH_TIMEOUT", 100)?),
                compression: env_parse("COMPRESSION", Compression::Snappy)?,
                async_publish: env_parse_bool("ASYNC", true)?,
                max_attempts: env_parse("MAX_ATTEMPTS", 3)?,
                required_acks: env_parse("REQUIRED_ACKS", RequiredAcks::Leader)?,
            },
            tcp: TcpServerConfig {
                port: env_parse("TCP_PORT", 8080)?,
                max_connections: env_parse("TCP_MAX_CONNECTIONS", 10_000)?,
                identify_timeout: Duration::from_secs(env_parse("TCP_IDENTIFY_TIMEOUT", 10)?),
                inactivity_timeout: Duration::from_secs(env_parse("TCP_INACTIVITY_TIMEOUT", 120)?),
                worker_count: env_parse("TCP_WORKER_COUNT", 0)?,
                job_queue_size: env_parse("TCP_JOB_QUEUE_SIZE", 2000)?,
                use_worker_pool: env_parse_bool("TCP_USE_WORKER_POOL", true)?,
            },
            aggregation: AggregationConfig {
                hourly_delay: Duration::from_secs(env_parse("AGGREGATION_HOURLY_DELAY", 300)?),
                daily_time: env_or("AGGREGATION_DAILY_TIME", "00:05"),
            },
            smtp: SmtpConfig {
                host: env_or("SMTP_HOST", "smtp.gmail.com"),
                port: env_parse("SMTP_PORT", 587)?,
                username: env_or("SMTP_USERNAME", ""),
                password: env_or("SMTP_PASSWORD", ""),
                from: env_or("SMTP_FROM", "weather-server@example.com"),
                to: env_or("SMTP_TO", "admin@example.com"),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|e| anyhow!("invalid {key}='{value}': {e}")),
        _ => Ok(default),
    }
}

fn env_parse_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => match value.as_str() {
            "true" | "1" | "on" | "yes" => Ok(true),
            "false" | "0" | "off" | "no" => Ok(false),
            other => Err(anyhow!("invalid {key}='{other}': expected a boolean")),
        },
        _ => Ok(default),
    }
}
