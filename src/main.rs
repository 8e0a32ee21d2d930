//! DevStudio - marketing site and back-office for a software studio

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devstudio::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{self, seed::seed_demo_content},
    services::create_mailer,
};

/// How often expired sessions and stale rate-limit entries are dropped
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devstudio=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DevStudio {}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = std::env::var("DEVSTUDIO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    if config.database.seed_demo {
        seed_demo_content(&pool).await?;
    }

    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized");

    let mailer = create_mailer(&config.mail)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::build(pool, config, cache, mailer)?;

    // Periodic cleanup (runs every 5 minutes)
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                state.rate_limiter.cleanup().await;
                match state.user_service.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Removed {} expired sessions", n),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
