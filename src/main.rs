use std::sync::Arc;

use arcade::channel::MemoryChannel;
use arcade::config::Config;
use arcade::oracle::anthropic::AnthropicOracle;
use arcade::oracle::{TutoringOracle, UnavailableOracle};
use arcade::relay::{self, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("arcade: no .env loaded ({e})");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "main: invalid configuration");
            return;
        }
    };

    let channel = Arc::new(MemoryChannel::new(config.subscriber_queue_depth));
    let oracle: Arc<dyn TutoringOracle> = match config.oracle.as_ref().map(AnthropicOracle::new) {
        Some(Ok(oracle)) => {
            tracing::info!(model = %oracle.model(), "main: tutoring oracle enabled");
            Arc::new(oracle)
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "main: oracle client failed to build, tutoring disabled");
            Arc::new(UnavailableOracle)
        }
        None => {
            tracing::warn!("main: LLM_API_KEY not set, tutoring disabled");
            Arc::new(UnavailableOracle)
        }
    };

    let mut state = AppState::new(channel, oracle);
    state.outbound_depth = config.subscriber_queue_depth;
    state.battle_rules = config.battle_rules();
    let app = relay::app(state, config.static_dir.as_deref());

    let port = config.port;
    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %port, "main: failed to bind");
            return;
        }
    };

    tracing::info!(%port, "arcade listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "main: server failed");
    }
}
