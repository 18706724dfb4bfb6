//! Error types for the findoc-analyzer library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`AnalyzerError`]: **fatal for the request**. The upload is rejected
//!   (wrong type, too large) or the analysis cannot complete (model failure,
//!   provider not configured). Returned as `Err(AnalyzerError)` from
//!   [`crate::analyze::Analyzer::analyze`] and mapped to an HTTP status by
//!   the server layer.
//!
//! * [`ExtractionError`]: **non-fatal**. The PDF could not be read (encrypted,
//!   corrupt, pdfium missing). It never escapes the extraction stage; it is
//!   folded into [`crate::output::DocumentText`] as a fallback notice so the
//!   model still receives a prompt and the caller still gets an answer.
//!
//! * [`ModelError`]: a single remote call failed. The retry loop in
//!   [`crate::pipeline::llm`] decides whether it becomes an
//!   [`AnalyzerError::ModelFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All request-fatal errors returned by the findoc-analyzer library.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Upload errors (client side) ───────────────────────────────────────
    /// Declared content type is not `application/pdf`.
    #[error("Only PDF files are allowed.")]
    UnsupportedFileType { content_type: Option<String> },

    /// Upload exceeds the configured size limit.
    #[error("File too large. Maximum allowed size is {}.", size_label(&.limit_bytes))]
    FileTooLarge { size: usize, limit_bytes: usize },

    /// Upload carried zero bytes.
    #[error("Uploaded file is empty.")]
    EmptyUpload,

    /// Declared as PDF but the content does not start with `%PDF`.
    #[error("Uploaded file is not a valid PDF (first bytes: {magic:?}).")]
    NotAPdf { magic: Vec<u8> },

    /// The multipart form had no `file` field.
    #[error("No file uploaded. Send the PDF in a multipart field named 'file'.")]
    MissingFile,

    /// The multipart body could not be parsed.
    #[error("Invalid multipart request: {0}")]
    InvalidMultipart(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every attempt at the remote model call failed.
    #[error("LLM call failed after {attempts} attempt(s): {detail}")]
    ModelFailed { attempts: u32, detail: String },

    /// The model did not answer within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the uploaded bytes to the data directory.
    #[error("Failed to stage upload at '{path}': {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a JSON artifact.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP listener could not be bound or failed while serving.
    #[error("Server error on {addr}: {source}")]
    ServerFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// `true` when the caller sent something we refuse to process.
    ///
    /// These errors are raised before any model call is attempted.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::UnsupportedFileType { .. }
                | AnalyzerError::FileTooLarge { .. }
                | AnalyzerError::EmptyUpload
                | AnalyzerError::NotAPdf { .. }
                | AnalyzerError::MissingFile
                | AnalyzerError::InvalidMultipart(_)
        )
    }

    /// Message safe to hand back to a client.
    ///
    /// Provider errors sometimes echo credential details; anything that talks
    /// about an API key is replaced with a generic notice.
    pub fn public_message(&self) -> String {
        redact_key_details(&self.to_string())
    }
}

/// Human-readable upload limit, rounded up: `10MB`, or `512KB` below 1 MiB.
fn size_label(bytes: &usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    if *bytes >= MIB {
        format!("{}MB", bytes.div_ceil(MIB))
    } else {
        format!("{}KB", bytes.div_ceil(KIB).max(1))
    }
}

/// Replace messages mentioning both "api" and "key" with a generic notice.
pub fn redact_key_details(msg: &str) -> String {
    let lower = msg.to_lowercase();
    if lower.contains("api") && lower.contains("key") {
        "API authentication error (key-related)".to_string()
    } else {
        msg.to_string()
    }
}

/// A non-fatal PDF extraction failure.
///
/// Folded into [`crate::output::DocumentText`] by
/// [`crate::pipeline::extract::read_document`]; never returned to HTTP callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The document needs a password we do not have.
    #[error("PDF is encrypted and cannot be read.")]
    Encrypted,

    /// pdfium could not parse the document.
    #[error("PDF extraction failed: {0}")]
    Corrupt(String),

    /// The pdfium shared library could not be loaded.
    #[error("PDF extraction failed: PDF engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// A single failed model call.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The provider returned an error.
    #[error("{0}")]
    Request(String),

    /// The provider returned an empty completion.
    #[error("model returned an empty response")]
    EmptyResponse,
}
