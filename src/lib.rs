//! # findoc-analyzer
//!
//! Analyse financial PDF documents with a hosted LLM (Gemini by default).
//!
//! A client uploads a PDF and a question; the service extracts the text
//! layer, asks the model for an analysis and returns four plain-text
//! sections: executive summary, financial analysis, risk assessment and
//! investment recommendations.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Input    validate type / size / %PDF magic, stage to data dir
//!  ├─ 2. Extract  per-page text via pdfium (spawn_blocking, never fails)
//!  ├─ 3. Signals  regex scan for headline metrics and risk keywords
//!  ├─ 4. Model    persona + task prompt, one call with timeout/retries
//!  ├─ 5. Shape    JSON / fenced JSON / headed prose → four sections
//!  └─ 6. Output   response JSON + analysis_<id>.json + debug_<id>.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use findoc_analyzer::{Analyzer, AnalyzerConfig, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Needs GEMINI_API_KEY in the environment.
//!     let analyzer = Analyzer::from_config(AnalyzerConfig::default())?;
//!     let bytes = std::fs::read("10-K.pdf")?;
//!     let upload = Upload::new("10-K.pdf", bytes).with_query("What are the main risks?");
//!     let response = analyzer.analyze(upload).await?;
//!     println!("{}", response.analysis.risk_assessment);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `findoc` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the library or the router in another service:
//! ```toml
//! findoc-analyzer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod artifact;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod signals;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::Analyzer;
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use error::{AnalyzerError, ExtractionError, ModelError};
pub use model::{AnalysisModel, ModelReply, ProviderModel};
pub use output::{AnalysisResponse, AnalysisSections, DebugRecord, DocumentText, ExtractionReport};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::input::Upload;
pub use prompts::{AnalysisPrompt, Persona, DEFAULT_QUERY};
pub use server::{build_router, serve};
pub use signals::FinancialSignals;
