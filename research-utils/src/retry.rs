//! ABOUTME: Exponential-backoff retry loop gated by error category
//! ABOUTME: An explicit loop per call site rather than a decorator macro

use rand::Rng;
use research_core::{ErrorCategory, ResearchError};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub enum JitterStrategy {
    #[default]
    None,
    Full,
    Equal,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: JitterStrategy,
    /// Override for which categories are retried at this call site.
    /// Defaults to the global retryable set `{Network, Llm}`.
    pub retryable: HashSet<ErrorCategory>,
}

impl RetryConfig {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter: JitterStrategy::None,
            retryable: [ErrorCategory::Network, ErrorCategory::Llm].into_iter().collect(),
        }
    }

    /// The workflow-level retry wrapper uses `max_retries = 2` and a 2s
    /// base delay, per the orchestrator's `_execute_with_retry`.
    pub fn workflow_level() -> Self {
        Self::new(2, Duration::from_secs(2))
    }

    /// Individual LLM-call sites typically retry once or twice with a 1s
    /// base delay.
    pub fn call_site(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::from_secs(1))
    }
}

fn delay_for(attempt: u32, config: &RetryConfig) -> Duration {
    let exp = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
    let jittered = match config.jitter {
        JitterStrategy::None => exp,
        JitterStrategy::Full => rand::thread_rng().gen_range(0.0..exp),
        JitterStrategy::Equal => exp / 2.0 + rand::thread_rng().gen_range(0.0..exp / 2.0),
    };
    Duration::from_secs_f64(jittered.max(0.0))
}

/// Runs `operation` with exponential backoff. Only failures whose
/// category is in `config.retryable` are retried; anything else
/// propagates immediately. When retries are exhausted the last failure
/// propagates unchanged.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: RetryConfig,
) -> Result<T, ResearchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ResearchError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let category = err.category();
                if attempt >= config.max_retries || !config.retryable.contains(&category) {
                    if attempt > 0 {
                        warn!(attempt, ?category, "retry exhausted, propagating failure");
                    }
                    return Err(err);
                }
                let delay = delay_for(attempt, &config);
                debug!(attempt, ?category, ?delay, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_category_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let config = RetryConfig::new(2, Duration::from_millis(1));

        let result = retry_with_backoff(
            move || {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        Err(ResearchError::llm("rate_limit"))
                    } else {
                        Ok::<_, ResearchError>(42)
                    }
                }
            },
            config,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_non_retryable_category() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let config = RetryConfig::new(2, Duration::from_millis(1));

        let result: Result<u32, _> = retry_with_backoff(
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ResearchError::business("bad input"))
                }
            },
            config,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let config = RetryConfig::new(1, Duration::from_millis(1));

        let result: Result<u32, _> = retry_with_backoff(
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ResearchError::network("timeout"))
                }
            },
            config,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
