//! HTTP transport for the registry.
//!
//! Handlers translate JSON bodies into service requests and map
//! [`crate::registry::services::RegistryServiceError`] onto status codes via
//! [`ApiError`], rendered with a clock timestamp as [`ErrorResponse`].

pub mod dto;
mod error;
mod handlers;
mod state;

pub use error::{ApiError, ErrorBody, ErrorResponse};
pub use state::AppState;

use crate::registry::ports::RegistryStore;
use axum::{
    Router,
    routing::{delete, get, head, post},
};
use mockable::Clock;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Builds the registry router over `state`.
///
/// With `enable_cors` every origin, method and header is allowed.
#[must_use]
pub fn router<S, C>(state: AppState<S, C>, enable_cors: bool) -> Router
where
    S: RegistryStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let app = Router::new()
        .route("/", get(handlers::root))
        .route(
            "/health",
            get(handlers::health::<S, C>).head(handlers::head_health::<S, C>),
        )
        .route("/agents", get(handlers::list_agents::<S, C>))
        .route("/agents/register", post(handlers::register_agent::<S, C>))
        .route("/agents/{agent_id}", delete(handlers::unregister_agent::<S, C>))
        .route("/heartbeat", post(handlers::heartbeat::<S, C>))
        .route("/heartbeat/{agent_id}", head(handlers::fast_heartbeat::<S, C>))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state));

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
