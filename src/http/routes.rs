//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.client_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, or any origin when none are configured
fn build_cors(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    base.allow_origin(allowed_origins).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    tick: u64,
    tanks: usize,
    bullets: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = &state.arena.stats;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: uptime_secs(),
        tick: stats.tick(),
        tanks: stats.tanks(),
        bullets: stats.bullets(),
    })
}
