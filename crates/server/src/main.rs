mod bootstrap;
mod health;
mod respond;

pub mod auth;
pub mod catalog;
pub mod orders;

use anyhow::Result;
use axum::Router;
use panaderia_core::config::{AppConfig, LoadOptions};
use panaderia_db::DbPool;
use tower_http::services::ServeDir;

fn init_logging(config: &AppConfig) {
    use panaderia_core::config::LogFormat::*;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG still wins when set, so operators can raise verbosity for a
    // single run without touching config.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);
    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let router = api_router(app.db_pool.clone(), &app.config);
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        static_dir = ?app.config.server.static_dir,
        "panaderia-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "panaderia-server stopping");
    Ok(())
}

/// The API routes, with the static frontend (when configured) as fallback:
/// unmatched paths serve the site's HTML and assets.
pub fn api_router(db_pool: DbPool, config: &AppConfig) -> Router {
    let mut router = Router::new()
        .merge(catalog::router(db_pool.clone()))
        .merge(auth::router(db_pool.clone()))
        .merge(orders::router(db_pool));

    if let Some(static_dir) = &config.server.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
