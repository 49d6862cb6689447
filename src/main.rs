//! School Events API server
//!
//! Main application entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use school_events::{
    api::{create_router, AppState},
    config::Settings,
    database::{create_pool, run_migrations, DatabaseService, PoolConfig},
    i18n::I18n,
    services::{RedisService, ServiceFactory},
    tasks::shutdown_signal,
    utils::logging,
};

/// How often idle clients are dropped from the login rate limiter
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load settings")?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file appender on exit
    let _guard = logging::init_logging(&settings.logging)?;

    info!("Starting {} API...", settings.app.project_name);

    // Initialize database connection
    info!("Connecting to database...");
    let pool = create_pool(&PoolConfig::from(&settings)).await?;
    run_migrations(&pool).await?;

    // Initialize Redis connection
    info!("Connecting to Redis...");
    let redis_service = RedisService::new(settings.clone())?;
    if !redis_service.health_check().await.unwrap_or(false) {
        warn!("Redis is not reachable; login lockout and background jobs are degraded");
    }

    // Initialize i18n system
    info!("Loading translations...");
    let mut i18n = I18n::new(&settings.i18n);
    i18n.load_translations().await?;

    // Initialize services
    let services = ServiceFactory::new(
        settings.clone(),
        DatabaseService::new(pool),
        redis_service,
        Arc::new(i18n),
    )?;

    tokio::fs::create_dir_all(&settings.app.files_dir)
        .await
        .with_context(|| format!("failed to create files directory {}", settings.app.files_dir))?;

    let state = AppState::new(services, settings.clone());
    let limiter_cleanup = state.login_limiter.spawn_cleanup(LIMITER_CLEANUP_INTERVAL);
    let app = create_router(state);

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(address = %address, prefix = %settings.app.api_prefix, "API server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    limiter_cleanup.abort();
    info!("API server has been shut down.");
    Ok(())
}
