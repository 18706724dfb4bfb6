//! End-to-end tests for findoc-analyzer.
//!
//! These tests read a real PDF through pdfium and make a live Gemini call.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! The document defaults to `./test_cases/sample_financial_report.pdf`;
//! point `E2E_PDF` at any other financial PDF to use that instead.

use findoc_analyzer::analyze::extract_document;
use findoc_analyzer::{Analyzer, AnalyzerConfig, PdfiumExtractor, Upload};
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn sample_pdf() -> PathBuf {
    std::env::var("E2E_PDF").map(PathBuf::from).unwrap_or_else(|_| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/sample_financial_report.pdf")
    })
}

/// Skip unless E2E_ENABLED is set and the sample PDF exists.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p = sample_pdf();
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn config(tmp: &tempfile::TempDir) -> AnalyzerConfig {
    AnalyzerConfig::builder()
        .data_dir(tmp.path().join("data"))
        .output_dir(tmp.path().join("outputs"))
        .max_retries(2)
        .build()
        .expect("valid config")
}

// ── Extraction only (pdfium, no LLM) ─────────────────────────────────────────

#[tokio::test]
async fn test_extract_sample_report() {
    let path = e2e_skip_unless_ready!();
    let tmp = tempfile::tempdir().unwrap();
    let config = config(&tmp);
    let bytes = std::fs::read(&path).unwrap();

    let report = extract_document(
        &config,
        Arc::new(PdfiumExtractor::new(config.pdfium_lib_path.clone())),
        &bytes,
    )
    .await
    .expect("extraction should succeed");

    assert!(report.document.success, "error: {:?}", report.document.error);
    assert!(report.document.total_pages > 0);
    assert!(report.document.has_text(), "sample should have a text layer");
    println!(
        "Extracted {} chars from {} pages; {} risk keywords",
        report.document.full_text.len(),
        report.document.total_pages,
        report.signals.total_risks
    );
}

// ── Full analysis (needs GEMINI_API_KEY) ─────────────────────────────────────

#[tokio::test]
async fn test_analyze_sample_report() {
    let path = e2e_skip_unless_ready!();
    if std::env::var("GEMINI_API_KEY").is_err() {
        println!("SKIP: GEMINI_API_KEY not set");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let analyzer = Analyzer::from_config(config(&tmp)).expect("analyzer");
    let bytes = std::fs::read(&path).unwrap();
    let upload = Upload::new("sample_financial_report.pdf", bytes)
        .with_query("Summarise revenue trends and the main risks.");

    let response = analyzer.analyze(upload).await.expect("analysis should succeed");

    assert_eq!(response.status, "success");
    let sections = &response.analysis;
    for (name, text) in [
        ("executive_summary", &sections.executive_summary),
        ("financial_analysis", &sections.financial_analysis),
        ("risk_assessment", &sections.risk_assessment),
        ("investment_recommendations", &sections.investment_recommendations),
    ] {
        assert!(!text.trim().is_empty(), "{name} is empty");
        assert!(!text.starts_with("```"), "{name} kept a code fence");
    }

    let artifact = tmp
        .path()
        .join("outputs")
        .join(format!("analysis_{}.json", response.file_id));
    assert!(artifact.exists(), "result artifact missing");

    println!("{}", serde_json::to_string_pretty(&response).unwrap());
}
