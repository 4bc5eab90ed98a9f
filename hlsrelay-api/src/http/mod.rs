// Module: http
// Relay gateway: CORS policy, admission control and upstream relaying

pub mod cors;
pub mod error;
pub mod relay;

use axum::Router;
use hlsrelay_core::Config;
use hlsrelay_proxy::{ConcurrencyGate, Fetcher, ProxyResult};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use cors::OriginAllowList;
pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub allowed_origins: Arc<OriginAllowList>,
    pub gate: ConcurrencyGate,
    pub fetcher: Arc<Fetcher>,
    pub require_terms_accepted: bool,
}

impl AppState {
    /// Build the state once at startup from configuration
    pub fn from_config(config: &Config) -> ProxyResult<Self> {
        let allowed_origins = OriginAllowList::parse(&config.cors.allowed_origins);
        if allowed_origins.is_empty() {
            tracing::warn!("No allowed origins configured, every browser origin will be rejected");
        }

        Ok(Self {
            allowed_origins: Arc::new(allowed_origins),
            gate: ConcurrencyGate::new(config.proxy.max_concurrent_fetches),
            fetcher: Arc::new(Fetcher::new(&config.proxy)?),
            require_terms_accepted: config.proxy.require_terms_accepted,
        })
    }
}

/// Create the HTTP router
///
/// Relaying is keyed on the `url` query parameter only, so the handler is the
/// fallback for every path and method.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(relay::handle_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
