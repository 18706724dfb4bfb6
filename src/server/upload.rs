use crate::error::AnalyzerError;
use crate::pipeline::input::Upload;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;

/// Filename used when the client sends none.
const DEFAULT_FILENAME: &str = "document.pdf";

/// Parse the `POST /analyze` form into an [`Upload`].
///
/// Expects a `file` part and an optional `query` part; other parts are
/// drained and ignored. `max_bytes` is only used to describe a body that
/// the transport limit cut off.
pub async fn parse_multipart(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<Upload, AnalyzerError> {
    let mut upload: Option<Upload> = None;
    let mut query: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(DEFAULT_FILENAME)
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?
                    .to_vec();

                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes,
                    query: None,
                });
            }
            "query" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
                query = Some(val);
            }
            _ => {
                // Ignore unknown fields
                field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_bytes))?;
            }
        }
    }

    let mut upload = upload.ok_or(AnalyzerError::MissingFile)?;
    upload.query = query;
    Ok(upload)
}

/// A body cut off by the request limit reads as "file too large".
fn multipart_error(e: MultipartError, max_bytes: usize) -> AnalyzerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalyzerError::FileTooLarge {
            // Lower bound: the exact size is unknown once the stream is cut.
            size: max_bytes.saturating_add(1),
            limit_bytes: max_bytes,
        }
    } else {
        AnalyzerError::InvalidMultipart(e.body_text())
    }
}
