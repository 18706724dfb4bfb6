//! Configuration types for the financial document analyzer.
//!
//! All service behaviour is controlled through [`AnalyzerConfig`], built via
//! its [`AnalyzerConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across request handlers, log it at startup,
//! and diff two deployments to understand why their answers differ.

use crate::error::AnalyzerError;
use crate::prompts::Persona;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Upload size limit applied when none is configured: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Provider used when neither the config nor the environment names one.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Configuration for the analyzer service.
///
/// Built via [`AnalyzerConfig::builder()`] or using
/// [`AnalyzerConfig::default()`].
///
/// # Example
/// ```rust
/// use findoc_analyzer::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .max_upload_bytes(5 * 1024 * 1024)
///     .model("gemini-2.5-pro")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
/// assert_eq!(config.model.as_deref(), Some("gemini-2.5-pro"));
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Address the HTTP server binds to. Default: `127.0.0.1:8000`.
    pub bind_addr: SocketAddr,

    /// Directory where uploads are staged for the duration of one request.
    /// Default: `data`.
    pub data_dir: PathBuf,

    /// Directory receiving `analysis_<id>.json` and `debug_<id>.json`.
    /// Default: `outputs`.
    pub output_dir: PathBuf,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// If None, `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` are consulted,
    /// then [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Analysis prose benefits from some variety; this is not a transcription
    /// task where determinism matters.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// Four sections of plain prose rarely exceed 2 000 tokens; the headroom
    /// keeps long documents from being cut mid-recommendation.
    pub max_tokens: usize,

    /// Extra attempts after a failed model call. Default: 0 (single call).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt.
    /// Default: 500.
    pub retry_backoff_ms: u64,

    /// Timeout for one model call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Upper bound on document characters sent to the model. Default: 120 000.
    ///
    /// Annual reports run to hundreds of pages. Truncating keeps the request
    /// inside the context window of the smaller Gemini models.
    pub max_document_chars: usize,

    /// Persona framing the analysis. Default: [`Persona::FinancialAnalyst`].
    pub persona: Persona,

    /// Custom system prompt. If None, the persona prompt is used.
    pub system_prompt: Option<String>,

    /// Add locally computed metric and risk hints to the prompt. Default: true.
    pub include_signals: bool,

    /// Explicit path to the pdfium shared library. If None, the usual
    /// discovery order applies (env var, executable dir, system).
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            max_document_chars: 120_000,
            persona: Persona::default(),
            system_prompt: None,
            include_signals: true,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("data_dir", &self.data_dir)
            .field("output_dir", &self.output_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_document_chars", &self.max_document_chars)
            .field("persona", &self.persona)
            .field("include_signals", &self.include_signals)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Request body limit for the HTTP layer.
    ///
    /// Multipart framing and the `query` field add overhead on top of the
    /// file itself; 1 MiB of slack lets oversized files reach the validator
    /// and get the descriptive "File too large" answer.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(1024 * 1024)
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_document_chars(mut self, n: usize) -> Self {
        self.config.max_document_chars = n;
        self
    }

    pub fn persona(mut self, persona: Persona) -> Self {
        self.config.persona = persona;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn include_signals(mut self, v: bool) -> Self {
        self.config.include_signals = v;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzerError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&c.model) || blank(&c.provider_name) {
            return Err(AnalyzerError::InvalidConfig(
                "provider and model must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.max_upload_bytes, 10 * 1024 * 1024);
        assert!(c.provider_name.is_none());
        assert!(c.model.is_none());
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.bind_addr.port(), 8000);
        assert!(c.include_signals);
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalyzerConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn zero_upload_limit_rejected() {
        let err = AnalyzerConfig::builder()
            .max_upload_bytes(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig(_)));
    }

    #[test]
    fn blank_model_rejected() {
        assert!(AnalyzerConfig::builder().model("  ").build().is_err());
        let c = AnalyzerConfig::builder().model("gemini-2.5-pro").build().unwrap();
        assert_eq!(c.model.as_deref(), Some("gemini-2.5-pro"));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(AnalyzerConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn body_limit_leaves_room_for_multipart_overhead() {
        let c = AnalyzerConfig::default();
        assert!(c.body_limit() > c.max_upload_bytes);
    }
}
