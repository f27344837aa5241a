//! API module for handling HTTP requests and responses

#[cfg(feature = "web")]
pub(crate) mod handlers;
#[cfg(feature = "web")]
pub mod responses;

#[cfg(feature = "web")]
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
#[cfg(feature = "web")]
use std::sync::Arc;
#[cfg(feature = "web")]
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
#[cfg(feature = "web")]
use crate::state::AppState;

#[cfg(feature = "web")]
pub use handlers::{index_page, info, search};

/// Bytes allowed on top of `max_upload_size` for multipart framing
#[cfg(feature = "web")]
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[cfg(feature = "web")]
/// Create the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Room for multipart boundaries and part headers on top of the file itself
    let body_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let images = ServeDir::new(&state.config.image_dir);
    let mount = format!("/{}", state.config.image_mount.trim_matches('/'));

    Router::new()
        .route("/", get(index_page))
        .route("/search", post(search))
        // Public health check
        .route("/api/health", get(health_check))
        .route("/api/info", get(info))
        .nest_service(&mount, images)
        // Oversized bodies surface as multipart errors inside `search`
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(feature = "web")]
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
