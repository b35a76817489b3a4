use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use hyperdrip::config::Config;
use hyperdrip::janitor::QueueJanitor;
use hyperdrip::queue::SqsMessageQueue;
use hyperdrip::store::PostgresLeadStore;
use hyperdrip::worker::{LoggingTransport, Worker, WorkerHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to create pool");

    let store = Arc::new(PostgresLeadStore::new(Arc::new(pool)));
    let queue = Arc::new(SqsMessageQueue::from_env().await);

    tracing::info!("hyperdrip-worker started");

    let janitor = QueueJanitor::new(
        queue.as_ref(),
        config.janitor_retention_days,
        config.test_mode,
    );
    janitor
        .sweep(StdDuration::from_secs(config.janitor_timeout_secs))
        .await;

    let worker = Worker::new(
        store,
        queue,
        Arc::new(LoggingTransport),
        config.test_mode,
        config.visibility_timeout_secs as u32,
        StdDuration::from_millis(config.worker_poll_interval_ms),
        StdDuration::from_millis(config.worker_message_delay_ms),
    );

    let (handle, stop_rx) = WorkerHandle::new();
    let worker = Arc::new(worker);
    let run_handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run(stop_rx).await }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping worker");
    handle.stop();

    let _ = run_handle.await;

    Ok(())
}
