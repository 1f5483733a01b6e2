//! Ingest server: the TCP front end plus an embedded db-writer instance.
//!
//! # Environment
//! See `config.rs` for every recognized variable. The interesting ones here:
//! `TCP_PORT`, `TCP_MAX_CONNECTIONS`, `TCP_IDENTIFY_TIMEOUT`,
//! `TCP_INACTIVITY_TIMEOUT`, `TCP_WORKER_COUNT` (0 = 4 × cores),
//! `TCP_JOB_QUEUE_SIZE`, `KAFKA_BROKERS`, `DB_*`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use skywatch_connection::Registry;
use skywatch_queue::{BatchWriter, BatchWriterConfig, Consumer, Producer};
use skywatch_server::config::{Config, DB_WRITER_GROUP};
use skywatch_server::server::WorkerPoolServer;
use skywatch_storage::WeatherStore;
use skywatch_timer::TimerManager;
use tokio::signal;

const TIMER_WORKERS: usize = 10;
const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    skywatch_server::init_tracing()?;

    let config = Config::load()?;
    tracing::info!(
        port = config.tcp.port,
        max_connections = config.tcp.max_connections,
        brokers = %config.kafka.brokers,
        db = %config.database.redacted_url(),
        "skywatch-server starting"
    );

    let store = Arc::new(WeatherStore::connect(&config.database.url()).await?);

    let producer = Arc::new(Producer::new(
        config.kafka.producer_config(&config.kafka.topic_metrics),
    )?);
    tracing::info!(
        topic = %config.kafka.topic_metrics,
        batch_size = config.kafka.batch_size,
        compression = config.kafka.compression.as_str(),
        async_publish = config.kafka.async_publish,
        "producer initialized"
    );

    let registry = Arc::new(Registry::new(config.tcp.max_connections));
    let timers = TimerManager::new(TIMER_WORKERS);
    timers.start();

    let server = WorkerPoolServer::new(
        config.tcp.clone(),
        registry.clone(),
        timers.clone(),
        producer,
    );
    server.start().await?;
    let shutdown = server.shutdown_token();

    // Embedded persistence worker; more instances join the same group as
    // separate skywatch-dbwriter processes.
    let consumer = Arc::new(Consumer::new(
        &config.kafka.brokers,
        &config.kafka.topic_metrics,
        DB_WRITER_GROUP,
    )?);
    let writer_token = shutdown.clone();
    let writer_handle = tokio::spawn(async move {
        let writer = BatchWriter::new(consumer, store, BatchWriterConfig::default());
        writer.run(writer_token).await;
    });
    tracing::info!(group = DB_WRITER_GROUP, "database writer started");

    let stats_registry = registry.clone();
    let stats_timers = timers.clone();
    let stats_token = shutdown.clone();
    let stats_handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(STATS_INTERVAL);
        loop {
            tokio::select! {
                _ = stats_token.cancelled() => break,
                _ = tick.tick() => {
                    let registry_stats = stats_registry.stats();
                    let timer_stats = stats_timers.stats();
                    tracing::info!(
                        connections = registry_stats.total_connections,
                        max_connections = registry_stats.max_connections,
                        unique_zipcodes = registry_stats.unique_zipcodes,
                        pending_timers = timer_stats.scheduled_tasks,
                        "server statistics"
                    );
                }
            }
        }
    });

    tracing::info!("skywatch-server running, Ctrl+C to stop");
    signal::ctrl_c().await?;
    tracing::info!("shutting down gracefully");

    server.stop().await;
    let _ = writer_handle.await;
    let _ = stats_handle.await;
    timers.stop().await;
    tracing::info!("skywatch-server stopped");

    Ok(())
}
