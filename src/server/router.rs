//! HTTP routes.
//!
//! Layers (outermost → innermost): trace → body limit → handler.

use crate::analyze::Analyzer;
use crate::server::handlers;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the service router around a shared [`Analyzer`].
pub fn build_router(analyzer: Arc<Analyzer>) -> Router {
    let body_limit = DefaultBodyLimit::max(analyzer.config().body_limit());

    Router::new()
        .route("/", get(handlers::health))
        .route("/analyze", post(handlers::analyze))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(analyzer)
}
