//! Router configuration and server setup.

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(&state.config))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        // Crew
        .route(
            "/api/crew",
            get(handlers::crew_status).post(handlers::run_crew),
        )
        .route("/api/crew/stream", post(handlers::stream_crew))
        // Apply middleware
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
pub async fn serve(config: ApiConfig, state: AppState) -> Result<(), std::io::Error> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, create_router(state)).await
}

fn allow_origin(config: &ApiConfig) -> AllowOrigin {
    if config.allows_any_origin() {
        return AllowOrigin::from(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}
