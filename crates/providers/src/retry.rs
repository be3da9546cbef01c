//! Retry wrapper: exponential backoff with jitter around any provider.
//!
//! Only `QuotaExceeded` and `Transient` failures are retried. `Unauthorized`
//! goes straight back to the caller. When attempts run out the last failure
//! is wrapped in `RetryExhausted` so the advisory can say how hard we tried.

use askdesk_config::RetryConfig;
use askdesk_core::provider::{CompletionRequest, CompletionResponse, Provider};
use askdesk_core::CompletionError;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry_index` (0-based).
    ///
    /// A provider hint acts as a floor. Returns `None` when the hint asks for
    /// longer than `max_delay`: waiting that long inside one request is not
    /// worth it, so the caller should give up.
    pub fn delay_for(&self, retry_index: u32, hint_secs: Option<u64>) -> Option<Duration> {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << retry_index.min(16))
            .min(self.max_delay);

        let mut delay = if self.jitter && !exp.is_zero() {
            // Full jitter over the upper half: [exp/2, exp]
            let half = exp / 2;
            let spread = rand::rng().random_range(0..=half.as_millis() as u64);
            half + Duration::from_millis(spread)
        } else {
            exp
        };

        if let Some(hint) = hint_secs.map(Duration::from_secs) {
            if hint > self.max_delay {
                return None;
            }
            delay = delay.max(hint);
        }

        Some(delay)
    }
}

/// Wraps a provider and retries retryable failures.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let err = match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Provider recovered after retry");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !err.is_retryable() || self.policy.max_attempts <= 1 {
                return Err(err);
            }

            if attempt >= self.policy.max_attempts {
                warn!(provider = %self.inner.name(), attempts = attempt, error = %err, "Retries exhausted");
                return Err(CompletionError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let hint = match &err {
                CompletionError::QuotaExceeded { retry_after_secs } => *retry_after_secs,
                _ => None,
            };

            let Some(delay) = self.policy.delay_for(attempt - 1, hint) else {
                warn!(
                    provider = %self.inner.name(),
                    attempts = attempt,
                    retry_after_secs = hint,
                    "Provider asked to wait longer than max delay, giving up"
                );
                return Err(CompletionError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            };

            warn!(
                provider = %self.inner.name(),
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes, then succeeds.
    struct ScriptedProvider {
        script: Mutex<VecDeque<CompletionError>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(failures: Vec<CompletionError>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(failures.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, CompletionError> {
            *self.calls.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(CompletionResponse {
                    text: format!("answer to {}", request.user_text),
                    model: request.model,
                    usage: None,
                }),
            }
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: false,
        }
    }

    fn transient() -> CompletionError {
        CompletionError::Transient("503".into())
    }

    #[test]
    fn delays_grow_and_cap() {
        let p = policy(10);
        assert_eq!(p.delay_for(0, None), Some(Duration::from_millis(500)));
        assert_eq!(p.delay_for(1, None), Some(Duration::from_millis(1000)));
        assert_eq!(p.delay_for(2, None), Some(Duration::from_millis(2000)));
        assert_eq!(p.delay_for(10, None), Some(Duration::from_secs(8)));
    }

    #[test]
    fn jitter_stays_within_upper_half() {
        let p = RetryPolicy {
            jitter: true,
            ..policy(5)
        };
        for _ in 0..100 {
            let d = p.delay_for(2, None).unwrap();
            assert!(d >= Duration::from_millis(1000) && d <= Duration::from_millis(2000));
        }
    }

    #[test]
    fn hint_is_floor_unless_too_long() {
        let p = policy(5);
        assert_eq!(p.delay_for(0, Some(3)), Some(Duration::from_secs(3)));
        assert_eq!(p.delay_for(0, Some(60)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let inner = ScriptedProvider::new(vec![transient(), transient()]);
        let provider = RetryingProvider::new(inner.clone(), policy(3));

        let start = tokio::time::Instant::now();
        let response = provider
            .complete(CompletionRequest::new("m", "i", "q"))
            .await
            .unwrap();

        assert_eq!(response.text, "answer to q");
        assert_eq!(inner.calls(), 3);
        // 500ms + 1000ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_with_retry_exhausted() {
        let inner = ScriptedProvider::new(vec![
            CompletionError::QuotaExceeded {
                retry_after_secs: None,
            };
            5
        ]);
        let provider = RetryingProvider::new(inner.clone(), policy(3));

        let err = provider
            .complete(CompletionRequest::new("m", "i", "q"))
            .await
            .unwrap_err();

        assert_eq!(inner.calls(), 3);
        let CompletionError::RetryExhausted { attempts, last } = err else {
            panic!("expected RetryExhausted, got {err:?}");
        };
        assert_eq!(attempts, 3);
        assert!(matches!(*last, CompletionError::QuotaExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_never_retried() {
        let inner = ScriptedProvider::new(vec![CompletionError::Unauthorized("HTTP 401".into())]);
        let provider = RetryingProvider::new(inner.clone(), policy(5));

        let err = provider
            .complete(CompletionRequest::new("m", "i", "q"))
            .await
            .unwrap_err();

        assert_eq!(inner.calls(), 1);
        assert!(matches!(err, CompletionError::Unauthorized(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_returns_original_error() {
        let inner = ScriptedProvider::new(vec![transient()]);
        let provider = RetryingProvider::new(inner.clone(), RetryPolicy::none());

        let err = provider
            .complete(CompletionRequest::new("m", "i", "q"))
            .await
            .unwrap_err();

        assert_eq!(inner.calls(), 1);
        assert_eq!(err, transient());
    }

    #[tokio::test(start_paused = true)]
    async fn honors_retry_after_hint() {
        let inner = ScriptedProvider::new(vec![CompletionError::QuotaExceeded {
            retry_after_secs: Some(4),
        }]);
        let provider = RetryingProvider::new(inner.clone(), policy(3));

        let start = tokio::time::Instant::now();
        provider
            .complete(CompletionRequest::new("m", "i", "q"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_hint_gives_up_early() {
        let inner = ScriptedProvider::new(vec![CompletionError::QuotaExceeded {
            retry_after_secs: Some(3600),
        }]);
        let provider = RetryingProvider::new(inner.clone(), policy(3));

        let err = provider
            .complete(CompletionRequest::new("m", "i", "q"))
            .await
            .unwrap_err();
        assert_eq!(inner.calls(), 1);
        assert!(matches!(err, CompletionError::RetryExhausted { attempts: 1, .. }));
    }
}
