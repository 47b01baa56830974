//! HTTP route definitions

use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::{invalid_path_handler, observer_ws_handler, player_ws_handler};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;

    Router::new()
        .route("/health", get(health_handler))
        .route(&server.player_path, get(player_ws_handler))
        .route(&server.observer_path, get(observer_ws_handler))
        .fallback(invalid_path_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    players: usize,
    observers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        players: state.registry.player_count(),
        observers: state.registry.observer_count(),
    })
}
