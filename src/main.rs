mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::Result;

use auth::TokenService;
use services::{GamificationService, RedisCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting Questlance backend"
    );

    // Create database pool and apply migrations
    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    // Create Redis cache
    let cache = RedisCache::new(&settings.redis_url, settings.redis_cache_ttl_seconds).await?;

    // Token service for issuing and verifying JWTs
    let tokens = TokenService::new(
        &settings.jwt_secret,
        settings.jwt_access_ttl_seconds,
        settings.jwt_refresh_ttl_seconds,
    );

    // Gamification orchestrator owns all point/streak/achievement writes
    let gamification = GamificationService::new(pool.clone(), cache.clone());

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), cache, tokens, gamification);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
