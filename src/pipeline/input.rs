//! Upload validation and staging.
//!
//! An upload is checked entirely in memory before anything touches disk or
//! the network. Only an accepted upload is staged under the data directory,
//! and the staged file lives exactly as long as its [`StagedUpload`] guard.

use crate::error::AnalyzerError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// MIME type accepted by the service.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file received from a client, with its form fields.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename as sent by the client. Only used for display.
    pub filename: String,
    /// Declared content type of the file part, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    /// Raw query field. Blank means "use the default query".
    pub query: Option<String>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: Some(PDF_CONTENT_TYPE.to_string()),
            bytes,
            query: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// `true` when the MIME essence of `content_type` is `application/pdf`.
///
/// Parameters (`; charset=...`) are ignored and the comparison is
/// case-insensitive.
pub fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Reject anything that is not a PDF within the size limit.
///
/// Checks run in this order: declared type, emptiness, size, magic bytes.
pub fn validate_upload(upload: &Upload, max_bytes: usize) -> Result<(), AnalyzerError> {
    if !is_pdf_content_type(upload.content_type.as_deref()) {
        warn!(
            filename = %upload.filename,
            content_type = ?upload.content_type,
            "Rejected upload: not a PDF"
        );
        return Err(AnalyzerError::UnsupportedFileType {
            content_type: upload.content_type.clone(),
        });
    }

    if upload.bytes.is_empty() {
        return Err(AnalyzerError::EmptyUpload);
    }

    if upload.bytes.len() > max_bytes {
        warn!(
            filename = %upload.filename,
            size = upload.bytes.len(),
            limit = max_bytes,
            "Rejected upload: too large"
        );
        return Err(AnalyzerError::FileTooLarge {
            size: upload.bytes.len(),
            limit_bytes: max_bytes,
        });
    }

    if !upload.bytes.starts_with(b"%PDF") {
        let magic = upload.bytes.iter().take(4).copied().collect();
        return Err(AnalyzerError::NotAPdf { magic });
    }

    Ok(())
}

/// An uploaded PDF written to the data directory.
///
/// The file is removed when the guard is dropped, whether the request
/// succeeded, failed, or panicked.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged upload {}: {}", self.path.display(), e),
        }
    }
}

/// Staged filename for `file_id`.
pub fn staged_file_name(file_id: &str) -> String {
    format!("financial_document_{file_id}.pdf")
}

/// Write `bytes` to `<data_dir>/financial_document_<file_id>.pdf`.
pub async fn stage_upload(
    bytes: &[u8],
    data_dir: &Path,
    file_id: &str,
) -> Result<StagedUpload, AnalyzerError> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| AnalyzerError::StagingFailed {
            path: data_dir.to_path_buf(),
            source: e,
        })?;

    let path = data_dir.join(staged_file_name(file_id));
    // Guard first, so a partial write is still cleaned up.
    let staged = StagedUpload { path };
    tokio::fs::write(&staged.path, bytes)
        .await
        .map_err(|e| AnalyzerError::StagingFailed {
            path: staged.path.clone(),
            source: e,
        })?;

    debug!("Staged {} bytes at {}", bytes.len(), staged.path.display());
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024;

    fn pdf(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(len.max(bytes.len()), b'0');
        bytes
    }

    #[test]
    fn content_type_essence_match() {
        assert!(is_pdf_content_type(Some("application/pdf")));
        assert!(is_pdf_content_type(Some("Application/PDF; name=x.pdf")));
        assert!(!is_pdf_content_type(Some("text/plain")));
        assert!(!is_pdf_content_type(Some("application/pdfx")));
        assert!(!is_pdf_content_type(None));
    }

    #[test]
    fn accepts_pdf_within_limit() {
        let upload = Upload::new("report.pdf", pdf(LIMIT));
        assert!(validate_upload(&upload, LIMIT).is_ok());
    }

    #[test]
    fn rejects_wrong_type_before_size() {
        let upload = Upload::new("notes.txt", vec![b'a'; LIMIT * 2]).with_content_type("text/plain");
        let err = validate_upload(&upload, LIMIT).unwrap_err();
        assert!(matches!(err, AnalyzerError::UnsupportedFileType { .. }));
    }

    #[test]
    fn rejects_oversize() {
        let upload = Upload::new("big.pdf", pdf(LIMIT + 1));
        let err = validate_upload(&upload, LIMIT).unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::FileTooLarge { size, limit_bytes } if size == LIMIT + 1 && limit_bytes == LIMIT
        ));
    }

    #[test]
    fn rejects_empty_and_bad_magic() {
        let empty = Upload::new("empty.pdf", Vec::new());
        assert!(matches!(
            validate_upload(&empty, LIMIT),
            Err(AnalyzerError::EmptyUpload)
        ));

        let fake = Upload::new("fake.pdf", b"PK\x03\x04zip".to_vec());
        match validate_upload(&fake, LIMIT) {
            Err(AnalyzerError::NotAPdf { magic }) => assert_eq!(magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn staged_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let staged = stage_upload(b"%PDF-1.4", &data_dir, "abc").await.unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "financial_document_abc.pdf"
        );
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }
}
