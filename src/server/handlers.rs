use crate::analyze::Analyzer;
use crate::error::AnalyzerError;
use crate::output::AnalysisResponse;
use crate::server::error::ApiError;
use crate::server::upload::parse_multipart;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const HEALTH_MESSAGE: &str = "Financial Document Analyzer API is running";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

/// `GET /`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE.to_string(),
    })
}

/// `POST /analyze`
pub async fn analyze(
    State(analyzer): State<Arc<Analyzer>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let multipart = multipart.map_err(|e| AnalyzerError::InvalidMultipart(e.body_text()))?;
    let upload = parse_multipart(multipart, analyzer.config().max_upload_bytes).await?;
    let response = analyzer.analyze(upload).await?;
    Ok(Json(response))
}
