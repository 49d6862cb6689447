//! Periodic scheduler: enqueues the recurring jobs

use anyhow::Context;
use tracing::info;

use school_events::{
    config::Settings,
    services::RedisService,
    tasks::{default_schedule, shutdown_channel, shutdown_signal, Beat, TaskQueue},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new().context("failed to load settings")?;
    settings.validate()?;
    let _guard = logging::init_logging(&settings.logging)?;

    info!("Starting {} beat...", settings.app.project_name);

    let redis_service = RedisService::new(settings.clone())?;
    let queue = TaskQueue::new(redis_service, &settings.tasks);

    let (stop_tx, stop_rx) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    Beat::new(queue, default_schedule(&settings.tasks)).run(stop_rx).await;

    info!("Beat has been shut down.");
    Ok(())
}
