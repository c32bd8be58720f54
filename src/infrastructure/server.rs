//! HTTP server setup

use axum::Router;
use axum::http::HeaderValue;
use std::net::{SocketAddr, TcpListener};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::api_docs::ApiDoc;
use crate::infrastructure::config::Config;
use crate::infrastructure::{db, seed, AppState};
use crate::services::{notifications, sweeper, NotificationDispatcher};

/// Build the full application router: API, docs, CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let mut origins = Vec::new();
        for origin in &state.config.cors_allowed_origins {
            match origin.parse::<HeaderValue>() {
                Ok(v) => origins.push(v),
                Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
            }
        }
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api::api_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Find an available port starting from the preferred port
pub fn find_available_port(preferred_port: u16) -> Option<u16> {
    // Try preferred port first
    if TcpListener::bind(("0.0.0.0", preferred_port)).is_ok() {
        return Some(preferred_port);
    }

    // Scan next 100 ports
    ((preferred_port + 1)..(preferred_port + 100))
        .find(|&port| TcpListener::bind(("0.0.0.0", port)).is_ok())
}

/// Initialise the database, start the background workers and serve the API
pub async fn run(config: Config) -> Result<(), String> {
    let db = db::init_db(&config.database_url)
        .await
        .map_err(|e| format!("Failed to initialize database: {}", e))?;

    if config.seed_demo {
        tracing::info!("Seeding demo data...");
        match seed::seed_demo_data(&db).await {
            Ok(()) => tracing::info!("Demo data seeded successfully."),
            Err(e) => tracing::error!("Failed to seed data: {}", e),
        }
    }

    // Notifications are drained by their own task, after commit
    let (notifier, rx) = NotificationDispatcher::new();
    tokio::spawn(notifications::run_notification_worker(db.clone(), rx));

    let state = AppState::new(db, config.clone(), notifier);

    tokio::spawn(sweeper::run_sweeper(
        state.reservations.clone(),
        config.sweep_interval,
    ));

    let app = build_router(state);

    let port = find_available_port(config.port)
        .ok_or_else(|| "Failed to find available port".to_string())?;
    if port != config.port {
        tracing::warn!(
            "Preferred port {} was not available, using port {} instead",
            config.port,
            port
        );
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("📡 Collectiva server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("HTTP server error: {}", e))
}
