//! Alarm evaluator: consumes raw samples, evaluates thresholds with duration
//! semantics and publishes triggered/cleared events onto the alarm topic.

use std::sync::Arc;

use anyhow::Result;
use skywatch_alarming::{AlarmWorker, Evaluator, RedisStateStore};
use skywatch_queue::{Consumer, Producer};
use skywatch_server::config::{Config, ALARMING_GROUP};
use skywatch_storage::WeatherStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    skywatch_server::init_tracing()?;

    let config = Config::load()?;
    tracing::info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.topic_metrics,
        alarm_topic = %config.kafka.topic_alarms,
        db = %config.database.redacted_url(),
        redis = %config.redis.url,
        "skywatch-alarming starting"
    );

    let store = Arc::new(WeatherStore::connect(&config.database.url()).await?);
    let states = Arc::new(
        RedisStateStore::connect(&config.redis.url)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to Redis: {e}"))?,
    );
    let alarm_producer = Arc::new(Producer::new(
        config.kafka.producer_config(&config.kafka.topic_alarms),
    )?);

    let evaluator = Arc::new(Evaluator::new(store, states, alarm_producer));
    let consumer = Arc::new(Consumer::new(
        &config.kafka.brokers,
        &config.kafka.topic_metrics,
        ALARMING_GROUP,
    )?);

    let shutdown = CancellationToken::new();
    let worker_token = shutdown.clone();
    let handle = tokio::spawn(async move {
        let worker = AlarmWorker::new(consumer, evaluator);
        worker.run(worker_token).await;
    });

    tracing::info!(group = ALARMING_GROUP, "skywatch-alarming running, Ctrl+C to stop");
    signal::ctrl_c().await?;
    tracing::info!("shutting down gracefully");

    shutdown.cancel();
    let _ = handle.await;
    tracing::info!("skywatch-alarming stopped");
    Ok(())
}
