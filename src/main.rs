mod academic_year;
mod api;
mod config;
mod db;
mod error;
mod promotion;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::ServerConfig;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homeroom_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    // Initialize database
    let db_path = config.database_path();
    let db = db::init_database(&db_path)
        .await
        .expect("Failed to initialize database");
    tracing::info!("Database initialized at {:?}", db_path);

    let state = Arc::new(AppState::new(db, &config));

    // Ensure default admin user exists (for bootstrapping)
    state
        .auth
        .ensure_admin_user("admin", &config.admin_password)
        .await
        .expect("Failed to create admin user");

    match state.auth.cleanup_expired_sessions().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired sessions", n),
        Err(e) => tracing::warn!("Failed to clean up expired sessions: {}", e),
    }

    let app = api::app(state);

    tracing::info!("Homeroom server starting on http://{}", config.bind_addr);
    tracing::info!("Commit attempts on connection errors: {}", config.commit_attempts);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
