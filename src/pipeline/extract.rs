//! Text extraction: read the text layer of a staged PDF via pdfium.
//!
//! ## Why does extraction never fail?
//!
//! An encrypted or scanned PDF is still a legitimate upload. Rather than
//! rejecting it, [`read_document`] folds every [`ExtractionError`] into a
//! [`DocumentText`] with `error` set; the prompt then tells the model the
//! text was unavailable and the client still gets a (necessarily thin)
//! analysis.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps a C++ library through blocking FFI calls. The
//! `Pdfium` handle is `!Send`, so each extraction binds the library on the
//! blocking thread that uses it. The OS caches `dlopen`, so repeat binds are
//! cheap.

use crate::error::ExtractionError;
use crate::output::{DocumentText, PageText};
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notice used when a document opens fine but carries no text layer.
pub const NO_TEXT_NOTICE: &str = "No extractable text found in the uploaded document.";

/// Raw per-page text as returned by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPages {
    pub total_pages: usize,
    /// One entry per page, in page order, possibly empty.
    pub pages: Vec<String>,
}

/// Blocking text extraction backend.
///
/// Implementations must be callable from any blocking-pool thread.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedPages, ExtractionError>;
}

/// [`TextExtractor`] backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    lib_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// `lib_path` overrides library discovery when set.
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    /// Check that the pdfium library can be bound.
    pub fn check_engine(&self) -> Result<(), ExtractionError> {
        load_pdfium(self.lib_path.as_deref()).map(|_| ())
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedPages, ExtractionError> {
        let pdfium = load_pdfium(self.lib_path.as_deref())?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(map_load_error)?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        let mut texts = Vec::with_capacity(total_pages);

        for (idx, page) in pages.iter().enumerate() {
            match page.text() {
                Ok(text) => texts.push(text.all()),
                Err(e) => {
                    // One unreadable page should not cost the rest of the document.
                    warn!("Page {}: text layer unreadable: {}", idx + 1, e);
                    texts.push(String::new());
                }
            }
        }

        debug!("pdfium read {} pages from {}", total_pages, path.display());
        Ok(ExtractedPages {
            total_pages,
            pages: texts,
        })
    }
}

/// Bind the pdfium shared library.
///
/// Discovery order:
/// 1. `explicit` (from config)
/// 2. `PDFIUM_DYNAMIC_LIB_PATH` env var
/// 3. Alongside the running executable
/// 4. System library search paths
fn load_pdfium(explicit: Option<&Path>) -> Result<Pdfium, ExtractionError> {
    let from_env = std::env::var("PDFIUM_DYNAMIC_LIB_PATH").ok().map(PathBuf::from);
    if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
        let lib = if path.is_dir() {
            PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
        } else {
            path
        };
        debug!("Binding pdfium from {}", lib.display());
        let bindings = Pdfium::bind_to_library(&lib).map_err(|e| {
            ExtractionError::EngineUnavailable(format!(
                "failed to load pdfium from {}: {e}",
                lib.display()
            ))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let lib = Pdfium::pdfium_platform_library_name_at_path(&exe_dir);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
            debug!("Bound pdfium next to executable in {}", exe_dir.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::EngineUnavailable(format!(
            "pdfium library not found; set PDFIUM_DYNAMIC_LIB_PATH or install pdfium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Classify a document load failure: password problems vs. everything else.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let detail = format!("{e:?}");
    let lower = detail.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") || lower.contains("security") {
        ExtractionError::Encrypted
    } else {
        ExtractionError::Corrupt(detail)
    }
}

// ── Whitespace normalisation ─────────────────────────────────────────────────

static RE_NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]{2,}").unwrap());

/// Collapse whitespace runs: `\n\n+` to one newline, other runs to a space.
pub fn normalise_whitespace(text: &str) -> String {
    let s = text.replace("\r\n", "\n").replace('\r', "\n");
    let s = RE_SPACE_RUNS.replace_all(&s, " ");
    let s = s
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    RE_NEWLINE_RUNS.replace_all(&s, "\n").trim().to_string()
}

/// Run `extractor` on `path` and fold the outcome into a [`DocumentText`].
///
/// Blocking; see [`read_document_blocking`] for the async wrapper.
pub fn read_document(extractor: &dyn TextExtractor, path: &Path) -> DocumentText {
    let extracted = match extractor.extract(path) {
        Ok(e) => e,
        Err(e) => {
            warn!("Text extraction failed for {}: {}", path.display(), e);
            return DocumentText::failed(e.to_string());
        }
    };

    let pages: Vec<PageText> = extracted
        .pages
        .iter()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let content = normalise_whitespace(raw);
            (!content.is_empty()).then_some(PageText {
                page_number: idx + 1,
                content,
            })
        })
        .collect();

    let full_text = pages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    let error = if full_text.is_empty() {
        warn!("{} has no text layer", path.display());
        Some(NO_TEXT_NOTICE.to_string())
    } else {
        None
    };

    info!(
        "Extracted {} characters from {}/{} pages",
        full_text.chars().count(),
        pages.len(),
        extracted.total_pages
    );

    DocumentText {
        success: true,
        full_text,
        pages,
        total_pages: extracted.total_pages,
        error,
    }
}

/// [`read_document`] on the blocking pool.
pub async fn read_document_blocking(
    extractor: Arc<dyn TextExtractor>,
    path: PathBuf,
) -> DocumentText {
    tokio::task::spawn_blocking(move || read_document(extractor.as_ref(), &path))
        .await
        .unwrap_or_else(|e| {
            warn!("Extraction task panicked: {}", e);
            DocumentText::failed(
                ExtractionError::Corrupt("extraction task panicked".into()).to_string(),
            )
        })
}
