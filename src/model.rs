//! The remote model seam.
//!
//! [`AnalysisModel`] is the only way the pipeline talks to an LLM. Production
//! code uses [`ProviderModel`], a thin wrapper over an `edgequake-llm`
//! provider; tests substitute a scripted implementation so the request path
//! can be exercised without network access or credentials.

use crate::config::{AnalyzerConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{AnalyzerError, ModelError};
use crate::prompts::AnalysisPrompt;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable holding the Gemini credential.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Text and token usage of one completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A chat model that turns an [`AnalysisPrompt`] into text.
pub trait AnalysisModel: Send + Sync {
    /// Provider name, for logs and the debug record.
    fn provider(&self) -> &str;

    /// Model identifier, for logs and the debug record.
    fn model(&self) -> &str;

    /// Send one system + user exchange and return the reply.
    fn complete<'a>(
        &'a self,
        prompt: &'a AnalysisPrompt,
    ) -> BoxFuture<'a, Result<ModelReply, ModelError>>;
}

/// [`AnalysisModel`] backed by an `edgequake-llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    provider_name: String,
    model: String,
    options: CompletionOptions,
}

impl std::fmt::Debug for ProviderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderModel")
            .field("provider", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderModel {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
        config: &AnalyzerConfig,
    ) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            model: model.into(),
            options: build_options(config),
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let resolved = resolve_provider(config)?;
        info!(
            provider = %resolved.provider_name,
            model = %resolved.model,
            "LLM provider ready"
        );
        Ok(Self::new(
            resolved.provider,
            resolved.provider_name,
            resolved.model,
            config,
        ))
    }
}

impl AnalysisModel for ProviderModel {
    fn provider(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn complete<'a>(
        &'a self,
        prompt: &'a AnalysisPrompt,
    ) -> BoxFuture<'a, Result<ModelReply, ModelError>> {
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(prompt.system.as_str()),
                ChatMessage::user(prompt.user.as_str()),
            ];
            let response = self
                .provider
                .chat(&messages, Some(&self.options))
                .await
                .map_err(|e| ModelError::Request(e.to_string()))?;

            if response.content.trim().is_empty() {
                return Err(ModelError::EmptyResponse);
            }
            debug!(
                "{} input tokens, {} output tokens",
                response.prompt_tokens, response.completion_tokens
            );
            Ok(ModelReply {
                content: response.content,
                prompt_tokens: response.prompt_tokens as u64,
                completion_tokens: response.completion_tokens as u64,
            })
        })
    }
}

/// Build `CompletionOptions` from the analyzer config.
fn build_options(config: &AnalyzerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// A provider together with the names it was resolved from.
pub struct ResolvedProvider {
    pub provider: Arc<dyn LLMProvider>,
    pub provider_name: String,
    pub model: String,
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`), created through
///    [`ProviderFactory::create_llm_provider`] with `config.model` or
///    [`DEFAULT_MODEL`].
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are non-empty.
/// 4. **Default**: [`DEFAULT_PROVIDER`] with `config.model` or
///    [`DEFAULT_MODEL`].
///
/// For the Gemini provider a missing `GEMINI_API_KEY` is reported here, at
/// startup, instead of on the first request.
pub fn resolve_provider(config: &AnalyzerConfig) -> Result<ResolvedProvider, AnalyzerError> {
    let model_or_default = || {
        config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    };

    if let Some(ref provider) = config.provider {
        return Ok(ResolvedProvider {
            provider: Arc::clone(provider),
            provider_name: config
                .provider_name
                .clone()
                .unwrap_or_else(|| "custom".to_string()),
            model: model_or_default(),
        });
    }

    let (name, model) = match config.provider_name {
        Some(ref name) => (name.clone(), model_or_default()),
        None => match env_pair(|k| std::env::var(k).ok()) {
            Some(pair) => pair,
            None => (DEFAULT_PROVIDER.to_string(), model_or_default()),
        },
    };

    check_credentials(&name, |k| std::env::var(k).ok())?;
    let provider = create_provider(&name, &model)?;
    Ok(ResolvedProvider {
        provider,
        provider_name: name,
        model,
    })
}

/// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are non-empty.
fn env_pair(lookup: impl Fn(&str) -> Option<String>) -> Option<(String, String)> {
    let provider = lookup("EDGEQUAKE_LLM_PROVIDER").filter(|v| !v.trim().is_empty())?;
    let model = lookup("EDGEQUAKE_MODEL").filter(|v| !v.trim().is_empty())?;
    Some((provider, model))
}

/// Fail early when a provider known to need a key has none.
pub fn check_credentials(
    provider_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), AnalyzerError> {
    if !provider_name.eq_ignore_ascii_case("gemini") {
        return Ok(());
    }
    match lookup(GEMINI_API_KEY_VAR) {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(AnalyzerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!(
                "{GEMINI_API_KEY_VAR} is not set. Export it or add it to a .env file."
            ),
        }),
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AnalyzerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&AnalyzerConfig::default());
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn gemini_requires_key() {
        let err = check_credentials("gemini", env(&[])).unwrap_err();
        assert!(matches!(err, AnalyzerError::ProviderNotConfigured { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(check_credentials("gemini", env(&[("GEMINI_API_KEY", "  ")])).is_err());
        assert!(check_credentials("gemini", env(&[("GEMINI_API_KEY", "k")])).is_ok());
    }

    #[test]
    fn other_providers_not_checked_here() {
        assert!(check_credentials("ollama", env(&[])).is_ok());
    }

    #[test]
    fn env_pair_needs_both_values() {
        assert_eq!(
            env_pair(env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "openai"),
                ("EDGEQUAKE_MODEL", "gpt-4.1-mini")
            ])),
            Some(("openai".to_string(), "gpt-4.1-mini".to_string()))
        );
        assert_eq!(env_pair(env(&[("EDGEQUAKE_LLM_PROVIDER", "openai")])), None);
        assert_eq!(
            env_pair(env(&[
                ("EDGEQUAKE_LLM_PROVIDER", "openai"),
                ("EDGEQUAKE_MODEL", "")
            ])),
            None
        );
    }
}
