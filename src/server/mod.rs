//! HTTP boundary: `GET /` and `POST /analyze`.
//!
//! The server holds no state of its own. Every request is handed to the
//! shared [`Analyzer`], and [`error::ApiError`] turns failures into
//! `{"status": "error", "detail": ...}` bodies.

pub mod error;
pub mod handlers;
pub mod router;
pub mod upload;

use crate::analyze::Analyzer;
use crate::error::AnalyzerError;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

pub use router::build_router;

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve(
    analyzer: Arc<Analyzer>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AnalyzerError> {
    let addr = analyzer.config().bind_addr;
    let server_err = |source| AnalyzerError::ServerFailed { addr, source };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(server_err)?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, build_router(analyzer))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(server_err)?;

    info!("Server stopped");
    Ok(())
}
