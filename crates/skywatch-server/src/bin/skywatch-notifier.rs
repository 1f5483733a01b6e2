//! Notification worker: consumes alarm transitions and emails them.

use std::sync::Arc;

use anyhow::Result;
use skywatch_notify::{EmailNotifier, NotifyWorker};
use skywatch_queue::Consumer;
use skywatch_server::config::{Config, NOTIFICATION_GROUP};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    skywatch_server::init_tracing()?;

    let config = Config::load()?;
    tracing::info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.topic_alarms,
        smtp = %config.smtp.host,
        "skywatch-notifier starting"
    );

    let smtp = &config.smtp;
    let username = (!smtp.username.is_empty()).then_some(smtp.username.as_str());
    let password = (!smtp.password.is_empty()).then_some(smtp.password.as_str());
    if username.is_none() {
        tracing::warn!("SMTP not configured, notifications will be logged only");
    }
    let notifier = Arc::new(EmailNotifier::new(
        &smtp.host,
        smtp.port,
        username,
        password,
        &smtp.from,
        &smtp.to,
    )?);

    let consumer = Arc::new(Consumer::new(
        &config.kafka.brokers,
        &config.kafka.topic_alarms,
        NOTIFICATION_GROUP,
    )?);

    let shutdown = CancellationToken::new();
    let worker_token = shutdown.clone();
    let handle = tokio::spawn(async move {
        let worker = NotifyWorker::new(consumer, notifier);
        worker.run(worker_token).await;
    });

    tracing::info!(group = NOTIFICATION_GROUP, "skywatch-notifier running, Ctrl+C to stop");
    signal::ctrl_c().await?;
    tracing::info!("shutting down gracefully");

    shutdown.cancel();
    let _ = handle.await;
    tracing::info!("skywatch-notifier stopped");
    Ok(())
}
