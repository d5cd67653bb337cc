//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Browsers reach the realtime channel through one websocket per room tab at
//! `/api/rooms/{room}/ws`. The same socket carries verification and tutor
//! requests, since the oracle's credentials never leave the server. When a
//! static directory is configured, the browser bundle is served at `/`.

pub mod ws;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use canvas::battle::BattleRules;

use crate::channel::RealtimeChannel;
use crate::oracle::TutoringOracle;

/// Shared handles for every connection.
#[derive(Clone)]
pub struct AppState {
    pub channel: Arc<dyn RealtimeChannel>,
    pub oracle: Arc<dyn TutoringOracle>,
    /// Depth of each socket's outbound frame queue.
    pub outbound_depth: usize,
    /// Announced to every client in `session:connected`.
    pub battle_rules: BattleRules,
}

impl AppState {
    #[must_use]
    pub fn new(channel: Arc<dyn RealtimeChannel>, oracle: Arc<dyn TutoringOracle>) -> Self {
        Self {
            channel,
            oracle,
            outbound_depth: crate::config::DEFAULT_SUBSCRIBER_QUEUE_DEPTH,
            battle_rules: BattleRules::default(),
        }
    }
}

/// API routes: the room websocket and the health check.
pub fn api_routes(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/rooms/{room}/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Full application: API routes, optional static bundle, tracing and compression.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = api_routes(state);
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };
    router.layer(CompressionLayer::new()).layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
