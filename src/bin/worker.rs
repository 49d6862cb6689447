//! Background worker: executes jobs enqueued by the API and beat

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use school_events::{
    config::Settings,
    database::{create_pool, DatabaseService, PoolConfig},
    i18n::I18n,
    services::{RedisService, ServiceFactory},
    tasks::{shutdown_channel, shutdown_signal, Worker},
    utils::logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::new().context("failed to load settings")?;
    settings.validate()?;
    let _guard = logging::init_logging(&settings.logging)?;

    info!("Starting {} worker...", settings.app.project_name);

    let pool = create_pool(&PoolConfig::from(&settings)).await?;
    let redis_service = RedisService::new(settings.clone())?;

    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations().await?;

    let services = ServiceFactory::new(
        settings.clone(),
        DatabaseService::new(pool),
        redis_service,
        Arc::new(i18n),
    )?;

    let (stop_tx, stop_rx) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    Worker::new(services, settings).run(stop_rx).await;

    info!("Worker has been shut down.");
    Ok(())
}
