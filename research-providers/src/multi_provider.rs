//! ABOUTME: Uniform generate/stream across N providers with ordered fallback
//! ABOUTME: Grounded in the original MultiProviderLLMClient's failover loop

use crate::classify::is_soft_error;
use futures::stream::BoxStream;
use research_core::{GenerateOptions, LlmProvider, ResearchError, TokenInfo};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Anthropic requires an explicit `max_tokens`; callers that omit one get
/// this floor.
pub const ANTHROPIC_MAX_TOKENS_FLOOR: u32 = 8192;

pub struct MultiProviderLlmClient {
    providers: Vec<Arc<dyn LlmProvider>>,
    last_provider: RwLock<Option<String>>,
}

impl MultiProviderLlmClient {
    /// Providers are tried strictly in the order given. Construct this
    /// once at composition-root time from `ResearchConfig` — the chain is
    /// never hot-reloaded.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self {
            providers,
            last_provider: RwLock::new(None),
        }
    }

    pub fn last_provider(&self) -> Option<String> {
        self.last_provider.read().unwrap().clone()
    }

    fn resolve_options(&self, provider: &dyn LlmProvider, options: &GenerateOptions) -> GenerateOptions {
        let mut opts = options.clone();
        if provider.name() == "anthropic" && opts.max_tokens.is_none() {
            opts.max_tokens = Some(ANTHROPIC_MAX_TOKENS_FLOOR);
        }
        opts
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<(String, TokenInfo), ResearchError> {
        let mut last_err = None;

        for provider in &self.providers {
            if !provider.is_available() {
                continue;
            }
            let opts = self.resolve_options(provider.as_ref(), options);
            match provider.generate(prompt, &opts).await {
                Ok((text, tokens)) if is_soft_error(&text) => {
                    let category = crate::classify::classify_message(&text);
                    warn!(provider = provider.name(), %text, "soft error detected");
                    if !category.is_retryable() {
                        return Err(ResearchError::llm(text));
                    }
                    let _ = tokens;
                    last_err = Some(ResearchError::llm(text));
                    continue;
                }
                Ok((text, tokens)) => {
                    *self.last_provider.write().unwrap() = Some(provider.name().to_string());
                    info!(provider = provider.name(), "generate succeeded");
                    return Ok((text, tokens));
                }
                Err(err) => {
                    let category = err.category();
                    if !category.is_retryable() {
                        return Err(err);
                    }
                    warn!(provider = provider.name(), ?category, "provider failed, advancing");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ResearchError::llm("no provider configured")))
    }

    /// Commits to the first provider whose stream yields at least one
    /// chunk; subsequent providers are not attempted once a provider
    /// commits.
    pub async fn stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<BoxStream<'static, Result<String, ResearchError>>, ResearchError> {
        let mut last_err = None;

        for provider in &self.providers {
            if !provider.is_available() {
                continue;
            }
            let opts = self.resolve_options(provider.as_ref(), options);
            match provider.stream(prompt, &opts).await {
                Ok(stream) => {
                    *self.last_provider.write().unwrap() = Some(provider.name().to_string());
                    return Ok(stream);
                }
                Err(err) => {
                    let category = err.category();
                    if !category.is_retryable() {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ResearchError::llm("no provider configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeProvider {
        name: &'static str,
        calls: AtomicU32,
        behavior: FakeBehavior,
    }

    enum FakeBehavior {
        AlwaysFailRetryable,
        AlwaysFailNonRetryable,
        Succeed,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<(String, TokenInfo), ResearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                FakeBehavior::AlwaysFailRetryable => Err(ResearchError::network("timeout")),
                FakeBehavior::AlwaysFailNonRetryable => Err(ResearchError::business("bad request")),
                FakeBehavior::Succeed => Ok(("ok".to_string(), TokenInfo::default())),
            }
        }

        async fn stream(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<BoxStream<'static, Result<String, ResearchError>>, ResearchError> {
            Ok(Box::pin(stream::once(async { Ok("chunk".to_string()) })))
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_on_retryable_failure() {
        let a = Arc::new(FakeProvider {
            name: "A",
            calls: AtomicU32::new(0),
            behavior: FakeBehavior::AlwaysFailRetryable,
        });
        let b = Arc::new(FakeProvider {
            name: "B",
            calls: AtomicU32::new(0),
            behavior: FakeBehavior::Succeed,
        });
        let client = MultiProviderLlmClient::new(vec![a, b]);

        let (text, _) = client
            .generate("hi", &GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(text, "ok");
        assert_eq!(client.last_provider().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn non_retryable_failure_breaks_the_loop_immediately() {
        let a = Arc::new(FakeProvider {
            name: "A",
            calls: AtomicU32::new(0),
            behavior: FakeBehavior::AlwaysFailNonRetryable,
        });
        let b = Arc::new(FakeProvider {
            name: "B",
            calls: AtomicU32::new(0),
            behavior: FakeBehavior::Succeed,
        });
        let client = MultiProviderLlmClient::new(vec![a, b.clone()]);

        let result = client.generate("hi", &GenerateOptions::default()).await;

        assert!(result.is_err());
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }
}
