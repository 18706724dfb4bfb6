//! Model interaction: one analysis call with timeout and bounded retries.
//!
//! All prompt wording lives in [`crate::prompts`]; this module only drives
//! the call.
//!
//! ## Retry Strategy
//!
//! The default is a single attempt (`max_retries = 0`). When retries are
//! enabled, backoff doubles from `retry_backoff_ms`: with 500 ms and 3
//! retries the waits are 500 ms → 1 s → 2 s. A timed-out attempt counts as a
//! failed attempt.

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::model::{AnalysisModel, ModelReply};
use crate::output::ModelUsage;
use crate::prompts::AnalysisPrompt;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Successful analysis call: the reply plus usage metadata.
#[derive(Debug, Clone)]
pub struct AnalysisCall {
    pub reply: ModelReply,
    pub usage: ModelUsage,
}

/// Run the analysis prompt against `model`.
///
/// Returns [`AnalyzerError::ModelTimeout`] when every attempt timed out and
/// [`AnalyzerError::ModelFailed`] when at least one attempt failed otherwise.
pub async fn run_analysis(
    model: &dyn AnalysisModel,
    prompt: &AnalysisPrompt,
    config: &AnalyzerConfig,
) -> Result<AnalysisCall, AnalyzerError> {
    let start = Instant::now();
    let per_call = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<String> = None;
    let mut all_timeouts = true;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Model call: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        debug!(
            provider = model.provider(),
            model = model.model(),
            attempt = attempt + 1,
            "Calling model"
        );

        match timeout(per_call, model.complete(prompt)).await {
            Ok(Ok(reply)) => {
                let duration = start.elapsed();
                info!(
                    "Model answered in {:?}: {} input tokens, {} output tokens",
                    duration, reply.prompt_tokens, reply.completion_tokens
                );
                let usage = ModelUsage {
                    provider: model.provider().to_string(),
                    model: model.model().to_string(),
                    prompt_tokens: reply.prompt_tokens,
                    completion_tokens: reply.completion_tokens,
                    attempts: attempt + 1,
                    duration_ms: duration.as_millis() as u64,
                };
                return Ok(AnalysisCall { reply, usage });
            }
            Ok(Err(e)) => {
                warn!("Model call attempt {} failed: {}", attempt + 1, e);
                all_timeouts = false;
                last_err = Some(e.to_string());
            }
            Err(_) => {
                warn!(
                    "Model call attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
            }
        }
    }

    if all_timeouts {
        return Err(AnalyzerError::ModelTimeout {
            secs: config.api_timeout_secs,
        });
    }
    Err(AnalyzerError::ModelFailed {
        attempts: config.max_retries + 1,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted outcomes; `None` sleeps past any test timeout.
    struct Scripted {
        outcomes: Mutex<Vec<Option<Result<ModelReply, ModelError>>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Option<Result<ModelReply, ModelError>>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl AnalysisModel for Scripted {
        fn provider(&self) -> &str {
            "mock"
        }
        fn model(&self) -> &str {
            "scripted"
        }
        fn complete<'a>(
            &'a self,
            _prompt: &'a AnalysisPrompt,
        ) -> BoxFuture<'a, Result<ModelReply, ModelError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.outcomes.lock().unwrap().pop();
            Box::pin(async move {
                match next {
                    Some(Some(outcome)) => outcome,
                    Some(None) => {
                        sleep(Duration::from_secs(3600)).await;
                        Err(ModelError::EmptyResponse)
                    }
                    None => Err(ModelError::Request("script exhausted".into())),
                }
            })
        }
    }

    fn reply(text: &str) -> Option<Result<ModelReply, ModelError>> {
        Some(Ok(ModelReply {
            content: text.to_string(),
            prompt_tokens: 10,
            completion_tokens: 5,
        }))
    }

    fn fail(msg: &str) -> Option<Result<ModelReply, ModelError>> {
        Some(Err(ModelError::Request(msg.to_string())))
    }

    fn prompt() -> AnalysisPrompt {
        AnalysisPrompt {
            system: "s".into(),
            user: "u".into(),
        }
    }

    fn config(retries: u32) -> AnalyzerConfig {
        AnalyzerConfig::builder()
            .max_retries(retries)
            .retry_backoff_ms(1)
            .api_timeout_secs(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn single_attempt_by_default() {
        let model = Scripted::new(vec![fail("503"), reply("late")]);
        let err = run_analysis(&model, &prompt(), &config(0)).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::ModelFailed { attempts: 1, .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let model = Scripted::new(vec![fail("429"), fail("503"), reply("ok")]);
        let call = run_analysis(&model, &prompt(), &config(3)).await.unwrap();
        assert_eq!(call.reply.content, "ok");
        assert_eq!(call.usage.attempts, 3);
        assert_eq!(call.usage.provider, "mock");
        assert_eq!(call.usage.prompt_tokens, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let model = Scripted::new(vec![None]);
        let err = run_analysis(&model, &prompt(), &config(0)).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::ModelTimeout { secs: 1 }));
    }

    #[tokio::test]
    async fn last_error_is_kept() {
        let model = Scripted::new(vec![fail("first"), fail("second")]);
        match run_analysis(&model, &prompt(), &config(1)).await {
            Err(AnalyzerError::ModelFailed { attempts, detail }) => {
                assert_eq!(attempts, 2);
                assert_eq!(detail, "second");
            }
            other => panic!("expected ModelFailed, got {other:?}"),
        }
    }
}
