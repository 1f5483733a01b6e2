//! Standalone persistence worker: drains the raw-metric topic into the
//! relational store. Run several to scale the `db-writer-group` out.

use std::sync::Arc;

use anyhow::Result;
use skywatch_queue::{BatchWriter, BatchWriterConfig, Consumer};
use skywatch_server::config::{Config, DB_WRITER_GROUP};
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
        db = %config.database.redacted_url(),
        "skywatch-dbwriter starting"
    );

    let store = Arc::new(WeatherStore::connect(&config.database.url()).await?);
    let consumer = Arc::new(Consumer::new(
        &config.kafka.brokers,
        &config.kafka.topic_metrics,
        DB_WRITER_GROUP,
    )?);

    let shutdown = CancellationToken::new();
    let writer_token = shutdown.clone();
    let handle = tokio::spawn(async move {
        let writer = BatchWriter::new(consumer, store, BatchWriterConfig::default());
        writer.run(writer_token).await;
    });

    tracing::info!(group = DB_WRITER_GROUP, "skywatch-dbwriter running, Ctrl+C to stop");
    signal::ctrl_c().await?;
    tracing::info!("shutting down gracefully");

    shutdown.cancel();
    let _ = handle.await;
    tracing::info!("skywatch-dbwriter stopped");
    Ok(())
}
