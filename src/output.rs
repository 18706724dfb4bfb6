//! Data types produced by an analysis run.
//!
//! [`AnalysisResponse`] is the HTTP response body and, unchanged, the content
//! of the per-request result artifact. [`DebugRecord`] is the richer audit
//! trail written next to it.

use crate::signals::FinancialSignals;
use serde::{Deserialize, Serialize};

/// The four free-text sections of an analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSections {
    pub executive_summary: String,
    pub financial_analysis: String,
    pub risk_assessment: String,
    pub investment_recommendations: String,
}

/// Body returned by `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Always `"success"`; failures use the error body instead.
    pub status: String,
    pub query: String,
    pub analysis: AnalysisSections,
    /// Original filename as sent by the client.
    pub file_processed: String,
    pub file_id: String,
    /// Wall-clock time, formatted as `"1.23s"`.
    pub processing_time: String,
}

/// Text of one PDF page after whitespace normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed.
    pub page_number: usize,
    pub content: String,
}

/// Outcome of reading a PDF. Always produced, even when extraction failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    /// `false` when the document could not be opened at all.
    pub success: bool,
    pub full_text: String,
    pub pages: Vec<PageText>,
    pub total_pages: usize,
    /// Human-readable reason when no text is available.
    pub error: Option<String>,
}

impl DocumentText {
    /// A failed read carrying `reason` as the fallback notice.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            full_text: String::new(),
            pages: Vec::new(),
            total_pages: 0,
            error: Some(reason.into()),
        }
    }

    /// `true` when there is document text to analyse.
    pub fn has_text(&self) -> bool {
        !self.full_text.trim().is_empty()
    }

    /// Text to embed in the prompt.
    ///
    /// Returns the extracted text truncated to `max_chars` characters, or the
    /// fallback notice when nothing could be extracted. The model is told the
    /// document was unreadable rather than being handed an empty string.
    pub fn prompt_text(&self, max_chars: usize) -> String {
        if !self.has_text() {
            let reason = self
                .error
                .as_deref()
                .unwrap_or("No extractable text found in the uploaded document.");
            return format!("[Document text unavailable: {reason}]");
        }
        match self.full_text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => format!(
                "{}\n[… document truncated after {} characters]",
                &self.full_text[..byte_idx],
                max_chars
            ),
            None => self.full_text.clone(),
        }
    }

    /// First `max_chars` characters of the text, for logs and debug records.
    pub fn preview(&self, max_chars: usize) -> String {
        if !self.has_text() {
            return "Unable to extract text preview".to_string();
        }
        let mut preview: String = self.full_text.chars().take(max_chars).collect();
        if self.full_text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// Text and local signals for one document, produced without a model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub document: DocumentText,
    pub signals: FinancialSignals,
}

/// Model metadata captured for the debug record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Audit trail for one request, written to `debug_<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugRecord {
    pub file_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub original_filename: String,
    pub query: String,
    pub file_size: usize,
    pub processing_steps: Vec<String>,
    pub text_preview: Option<String>,
    pub extraction: Option<ExtractionSummary>,
    pub signals: Option<FinancialSignals>,
    pub response_metadata: Option<ModelUsage>,
    pub processing_time_seconds: Option<f64>,
    pub completion_time: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

/// Extraction outcome without the full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub success: bool,
    pub total_pages: usize,
    pub pages_with_text: usize,
    pub characters: usize,
    pub error: Option<String>,
}

impl From<&DocumentText> for ExtractionSummary {
    fn from(doc: &DocumentText) -> Self {
        Self {
            success: doc.success,
            total_pages: doc.total_pages,
            pages_with_text: doc.pages.len(),
            characters: doc.full_text.chars().count(),
            error: doc.error.clone(),
        }
    }
}

impl DebugRecord {
    pub fn new(file_id: &str, original_filename: &str, query: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            timestamp: chrono::Utc::now(),
            original_filename: original_filename.to_string(),
            query: query.to_string(),
            file_size: 0,
            processing_steps: Vec::new(),
            text_preview: None,
            extraction: None,
            signals: None,
            response_metadata: None,
            processing_time_seconds: None,
            completion_time: None,
            error: None,
        }
    }

    /// Append a processing step.
    pub fn step(&mut self, step: impl Into<String>) {
        self.processing_steps.push(step.into());
    }
}
