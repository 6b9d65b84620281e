//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::handlers;
use super::AppState;

/// Route prefixes a videos directory may not shadow.
const RESERVED_PREFIXES: &[&str] = &["", "api", "health", "videos"];

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let videos = ServeDir::new(&state.videos_dir);

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Scraping API
        .route("/api/scrape", post(handlers::scrape))
        .route("/api/enrich", post(handlers::enrich))
        // Session recordings
        .nest_service("/videos", videos.clone());

    if let Some(reference) = state.videos_reference.as_deref() {
        let first = reference.split('/').next().unwrap_or_default();
        if !RESERVED_PREFIXES.contains(&first) {
            router = router.nest_service(&format!("/{}", reference), videos);
        }
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}
