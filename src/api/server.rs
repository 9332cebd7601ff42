use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::handler::{
    get_leaderboard_handler, health_handler, save_score_handler,
    save_score_ignore_duplicate_handler, version_handler, AppState,
};
use crate::config::{AppConfig, Mode};
use crate::domain::LeaderboardService;
use crate::scheduler::ResetScheduler;
use crate::store::{create_pool, RedisRankingStore};

pub fn init_tracing(mode: Mode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);

    match mode {
        // JSON lines for log shipping
        Mode::Pro => registry
            .with(fmt::layer().json().with_target(false))
            .init(),
        Mode::Dev => registry.with(fmt::layer()).init(),
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(version_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/score", post(save_score_handler))
        .route("/api/v1/dup/score", post(save_score_ignore_duplicate_handler))
        .route("/api/v1/leaderboard", get(get_leaderboard_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn run_server() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.mode);

    info!(version = %config.version, mode = ?config.mode, "Starting leaderboard server");

    let pool = create_pool(&config.redis).await?;
    let store = Arc::new(RedisRankingStore::new(pool, &config.redis, &config.leaderboard));
    let service = Arc::new(LeaderboardService::new(store, config.leaderboard.clone()));

    let scheduler = ResetScheduler::new(service.clone(), config.scheduler.clone()).spawn();

    let app = create_app(AppState::new(service, config.version.clone()));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutting down gracefully...");
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    scheduler.abort();
    served?;

    Ok(())
}
