//! Router construction.

use std::path::Path;

use axum::{
    extract::{DefaultBodyLimit, Request},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::handlers;
use crate::AppState;

/// Build the full router.
///
/// With `static_dir` set, unmatched paths are served from it (the browser
/// client); otherwise `/` answers with a plain banner.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let body_limit = state.limits.body_limit();

    let api = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ocr", post(handlers::ocr::ocr))
        .route("/recheck", post(handlers::recheck::recheck))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api.route("/", get(|| async { "Washout check API running" })),
    };

    app.layer(CorsLayer::permissive()).layer(
        TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }),
    )
}
