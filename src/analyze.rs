//! The analysis pipeline, end to end.
//!
//! [`Analyzer`] owns the configuration and the two external seams (text
//! extraction and the model). It is shared read-only between requests; each
//! call to [`Analyzer::analyze`] owns its file id, staged file and debug
//! record.

use crate::artifact;
use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::model::{AnalysisModel, ProviderModel};
use crate::output::{
    AnalysisResponse, DebugRecord, DocumentText, ExtractionReport, ExtractionSummary,
};
use crate::pipeline::extract::{read_document_blocking, PdfiumExtractor, TextExtractor};
use crate::pipeline::input::{stage_upload, validate_upload, Upload};
use crate::pipeline::llm::run_analysis;
use crate::pipeline::shape::shape_reply;
use crate::prompts::{effective_query, system_message, task_message, AnalysisPrompt};
use crate::signals::{self, FinancialSignals};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Characters of extracted text kept in the debug record.
const TEXT_PREVIEW_CHARS: usize = 500;

/// Runs uploads through validation, extraction, the model and shaping.
pub struct Analyzer {
    config: AnalyzerConfig,
    model: Arc<dyn AnalysisModel>,
    extractor: Arc<dyn TextExtractor>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("provider", &self.model.provider())
            .field("model", &self.model.model())
            .finish()
    }
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        model: Arc<dyn AnalysisModel>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            config,
            model,
            extractor,
        }
    }

    /// Production wiring: the configured LLM provider and pdfium.
    ///
    /// Fails when the provider cannot be created, e.g. `GEMINI_API_KEY` is
    /// missing.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let model = ProviderModel::from_config(&config)?;
        let extractor = PdfiumExtractor::new(config.pdfium_lib_path.clone());
        if let Err(e) = extractor.check_engine() {
            // Not fatal: documents fall back to the "unavailable" notice.
            warn!("pdfium is not available, text extraction will fail: {}", e);
        }
        Ok(Self::new(config, Arc::new(model), Arc::new(extractor)))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyse one uploaded document.
    ///
    /// Rejected uploads return a client error before anything is written or
    /// sent. After validation every outcome leaves a debug record in the
    /// output directory; success also leaves the response artifact.
    pub async fn analyze(&self, upload: Upload) -> Result<AnalysisResponse, AnalyzerError> {
        let start = Instant::now();
        let file_id = Uuid::new_v4().to_string();
        let query = effective_query(upload.query.as_deref());

        info!(
            file_id = %file_id,
            filename = %upload.filename,
            size = upload.bytes.len(),
            "Analysis requested"
        );

        validate_upload(&upload, self.config.max_upload_bytes)?;

        let mut record = DebugRecord::new(&file_id, &upload.filename, &query);
        record.file_size = upload.bytes.len();
        record.step("File validated");

        let outcome = self
            .run_pipeline(&upload, &file_id, &query, &mut record, start)
            .await;

        let elapsed = start.elapsed().as_secs_f64();
        record.processing_time_seconds = Some(elapsed);
        record.completion_time = Some(chrono::Utc::now());

        match outcome {
            Ok(response) => {
                match artifact::save_result(&self.config.output_dir, &response).await {
                    Ok(path) => record.step(format!("Result saved to {}", path.display())),
                    Err(e) => warn!(file_id = %file_id, "Could not save result: {}", e),
                }
                self.save_debug(&record).await;
                info!(file_id = %file_id, "Analysis complete in {:.2}s", elapsed);
                Ok(response)
            }
            Err(e) => {
                error!(file_id = %file_id, "Analysis failed: {}", e);
                record.error = Some(e.public_message());
                self.save_debug(&record).await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        upload: &Upload,
        file_id: &str,
        query: &str,
        record: &mut DebugRecord,
        start: Instant,
    ) -> Result<AnalysisResponse, AnalyzerError> {
        // ── Step 1: Stage upload ─────────────────────────────────────────
        let staged = stage_upload(&upload.bytes, &self.config.data_dir, file_id).await?;
        record.step(format!("File staged at {}", staged.path().display()));

        // ── Step 2: Extract text ─────────────────────────────────────────
        let document =
            read_document_blocking(Arc::clone(&self.extractor), staged.path().to_path_buf())
                .await;
        record.text_preview = Some(document.preview(TEXT_PREVIEW_CHARS));
        record.extraction = Some(ExtractionSummary::from(&document));
        record.step(match document.error {
            Some(ref reason) => format!("Text extraction fell back: {reason}"),
            None => format!(
                "Text extracted: {} characters",
                document.full_text.chars().count()
            ),
        });

        // The model only needs the text from here on.
        drop(staged);

        // ── Step 3: Local signals ────────────────────────────────────────
        let signals = signals::analyze_text(&document.full_text);
        record.step(format!(
            "Signals computed: {} risk keywords",
            signals.total_risks
        ));
        record.signals = Some(signals.clone());

        // ── Step 4: Model call ───────────────────────────────────────────
        let prompt = self.build_prompt(query, &document, &signals);
        record.step("Analysis prompt built");
        let call = run_analysis(self.model.as_ref(), &prompt, &self.config).await?;
        record.step(format!(
            "Model answered ({} attempt(s))",
            call.usage.attempts
        ));
        record.response_metadata = Some(call.usage);

        // ── Step 5: Shape reply ──────────────────────────────────────────
        let analysis = shape_reply(&call.reply.content);
        record.step("Response shaped");

        Ok(AnalysisResponse {
            status: "success".to_string(),
            query: query.to_string(),
            analysis,
            file_processed: upload.filename.clone(),
            file_id: file_id.to_string(),
            processing_time: format!("{:.2}s", start.elapsed().as_secs_f64()),
        })
    }

    /// Render the system and task messages for one document.
    pub fn build_prompt(
        &self,
        query: &str,
        document: &DocumentText,
        signals: &FinancialSignals,
    ) -> AnalysisPrompt {
        let signal_block = (self.config.include_signals && document.has_text())
            .then(|| signals::render_for_prompt(signals));
        AnalysisPrompt {
            system: system_message(self.config.persona, self.config.system_prompt.as_deref()),
            user: task_message(
                query,
                &document.prompt_text(self.config.max_document_chars),
                signal_block.as_deref(),
            ),
        }
    }

    /// Extract text and compute signals without calling the model.
    pub async fn extract_only(&self, bytes: &[u8]) -> Result<ExtractionReport, AnalyzerError> {
        extract_document(&self.config, Arc::clone(&self.extractor), bytes).await
    }

    async fn save_debug(&self, record: &DebugRecord) {
        if let Err(e) = artifact::save_debug(&self.config.output_dir, record).await {
            warn!(file_id = %record.file_id, "Could not save debug record: {}", e);
        }
    }
}

/// Validate, stage and read `bytes`, then compute local signals.
///
/// Needs no model, so it works without any provider credentials.
pub async fn extract_document(
    config: &AnalyzerConfig,
    extractor: Arc<dyn TextExtractor>,
    bytes: &[u8],
) -> Result<ExtractionReport, AnalyzerError> {
    let upload = Upload::new("document.pdf", bytes.to_vec());
    validate_upload(&upload, config.max_upload_bytes)?;

    let file_id = Uuid::new_v4().to_string();
    let staged = stage_upload(bytes, &config.data_dir, &file_id).await?;
    let document = read_document_blocking(extractor, staged.path().to_path_buf()).await;
    let signals = signals::analyze_text(&document.full_text);
    Ok(ExtractionReport { document, signals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, ModelError};
    use crate::model::ModelReply;
    use crate::pipeline::extract::ExtractedPages;
    use futures::future::BoxFuture;
    use std::path::Path;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<AnalysisPrompt>>,
    }

    impl AnalysisModel for Echo {
        fn provider(&self) -> &str {
            "mock"
        }
        fn model(&self) -> &str {
            "echo"
        }
        fn complete<'a>(
            &'a self,
            prompt: &'a AnalysisPrompt,
        ) -> BoxFuture<'a, Result<ModelReply, ModelError>> {
            self.seen.lock().unwrap().push(prompt.clone());
            Box::pin(async {
                Ok(ModelReply {
                    content: r#"{"executive_summary": "ok"}"#.to_string(),
                    ..Default::default()
                })
            })
        }
    }

    struct Locked;

    impl TextExtractor for Locked {
        fn extract(&self, _path: &Path) -> Result<ExtractedPages, ExtractionError> {
            Err(ExtractionError::Encrypted)
        }
    }

    struct Text(&'static str);

    impl TextExtractor for Text {
        fn extract(&self, _path: &Path) -> Result<ExtractedPages, ExtractionError> {
            Ok(ExtractedPages {
                total_pages: 1,
                pages: vec![self.0.to_string()],
            })
        }
    }

    fn analyzer(dir: &Path, extractor: Arc<dyn TextExtractor>) -> (Analyzer, Arc<Echo>) {
        let model = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let config = AnalyzerConfig::builder()
            .data_dir(dir.join("data"))
            .output_dir(dir.join("outputs"))
            .build()
            .unwrap();
        (Analyzer::new(config, model.clone(), extractor), model)
    }

    #[tokio::test]
    async fn prompt_carries_query_text_and_signals() {
        let dir = tempfile::tempdir().unwrap();
        let (a, model) = analyzer(dir.path(), Arc::new(Text("Revenue of $12 million. Litigation pending.")));
        let upload = Upload::new("q3.pdf", b"%PDF-1.7 body".to_vec()).with_query("Is it a buy?");
        let response = a.analyze(upload).await.unwrap();

        assert_eq!(response.query, "Is it a buy?");
        assert_eq!(response.analysis.executive_summary, "ok");
        let seen = model.seen.lock().unwrap();
        assert!(seen[0].user.contains("Revenue of $12 million."));
        assert!(seen[0].user.contains("Litigation Risk: 1"));
        assert!(seen[0].system.contains("Senior Financial Analyst"));
    }

    #[tokio::test]
    async fn encrypted_document_still_analysed() {
        let dir = tempfile::tempdir().unwrap();
        let (a, model) = analyzer(dir.path(), Arc::new(Locked));
        let response = a
            .analyze(Upload::new("locked.pdf", b"%PDF-1.7".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status, "success");
        let seen = model.seen.lock().unwrap();
        assert!(seen[0].user.contains("PDF is encrypted and cannot be read."));
        assert!(!seen[0].user.contains("Pre-computed signals"));
    }

    #[tokio::test]
    async fn extract_only_skips_model() {
        let dir = tempfile::tempdir().unwrap();
        let (a, model) = analyzer(dir.path(), Arc::new(Text("Net income: 40")));
        let report = a.extract_only(b"%PDF-1.5").await.unwrap();

        assert_eq!(report.document.full_text, "Net income: 40");
        assert_eq!(report.signals.metrics.profit.as_deref(), Some("40"));
        assert!(model.seen.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("data")).unwrap().count(), 0);
    }
}
