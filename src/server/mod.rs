mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::directory::InMemoryDirectory;
use crate::engine::LaneEngine;

pub fn build_router(engine: LaneEngine<InMemoryDirectory>) -> Router {
    let state = Arc::new(AppState { engine });

    Router::new()
        .route("/api/lanes", post(handlers::process_lanes))
        .route("/api/cities", get(handlers::city_lookup))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(engine: LaneEngine<InMemoryDirectory>, host: &str, port: u16) {
    let app = build_router(engine);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: Cannot bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    info!(%addr, "lane server listening");
    eprintln!("  Lane Alternates server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        });
}
