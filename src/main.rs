use std::{error::Error, net::SocketAddr, sync::Arc};

use foodgram::{
    api::{routes::routes, state::AppState},
    cache::cache::Cache,
    config::Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Received Ctrl+C, shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?;

    log::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let cache = Cache::connect(config.redis_url.as_deref()).await;
    let address: SocketAddr = config.address().parse()?;

    tokio::fs::create_dir_all(&config.media_root).await?;
    let state = Arc::new(AppState::new(pool, cache, config));

    let (address, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(address, shutdown_signal())?;
    log::info!("Server running on {address}");
    server.await;

    log::info!("Server shut down");
    Ok(())
}
