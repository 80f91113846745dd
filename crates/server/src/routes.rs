//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_size;

    let mut router = Router::new()
        .route(
            "/upload",
            post(handlers::upload_extension).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/updates.xml", get(handlers::get_update_feed))
        .route("/repo/{app}/{version}/{file}", get(handlers::get_package))
        // Health check for load balancers and probes
        .route("/v1/health", get(handlers::health_check));

    // When enabled, /metrics should be network-restricted to the scraper.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .fallback(handlers::upload_page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
