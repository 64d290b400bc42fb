//! Generic retry driver.
//!
//! Knows nothing about HTTP, tokens or proxies: it runs an async operation,
//! asks the policy whether a failure is worth retrying, waits according to
//! [`crate::backoff`], and tries again until the attempt budget is spent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use yfsession_types::{RetryConfig, YfError};

use crate::backoff::next_delay;
use crate::classify;

/// Decides whether a failure may be retried.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
/// Extracts a per-failure delay hint that replaces the exponential base.
pub type DelayOverride<E> = Arc<dyn Fn(&E) -> Option<Duration> + Send + Sync>;
/// Observes each scheduled retry: `(error, retry_number, delay)`.
pub type RetryCallback<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;

/// Immutable retry policy: numeric knobs plus classifier and hooks.
pub struct RetryPolicy<E> {
    config: RetryConfig,
    is_retryable: RetryPredicate<E>,
    delay_override: Option<DelayOverride<E>>,
    on_retry: Option<RetryCallback<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            is_retryable: Arc::clone(&self.is_retryable),
            delay_override: self.delay_override.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("delay_override", &self.delay_override.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E> {
    /// Policy with the given knobs and classifier, no hooks.
    pub fn new<F>(config: RetryConfig, is_retryable: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            config,
            is_retryable: Arc::new(is_retryable),
            delay_override: None,
            on_retry: None,
        }
    }

    /// Replace the classifier.
    #[must_use]
    pub fn retry_if<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(f);
        self
    }

    /// Install a per-failure delay override.
    #[must_use]
    pub fn delay_override<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> Option<Duration> + Send + Sync + 'static,
    {
        self.delay_override = Some(Arc::new(f));
        self
    }

    /// Install a retry observer.
    #[must_use]
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&E, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(f));
        self
    }

    /// Install an already shared retry observer.
    #[must_use]
    pub fn on_retry_shared(mut self, f: Option<RetryCallback<E>>) -> Self {
        self.on_retry = f;
        self
    }

    /// Numeric knobs.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run the classifier.
    pub fn is_retryable(&self, err: &E) -> bool {
        (self.is_retryable)(err)
    }

    /// Delay before retry number `attempt + 1`, honoring the override hook.
    pub fn delay_for(&self, attempt: u32, err: &E) -> Duration {
        let hint = self.delay_override.as_ref().and_then(|f| f(err));
        next_delay(attempt, &self.config, hint)
    }
}

impl RetryPolicy<YfError> {
    /// Rate-limited and transient failures are retried; `Retry-After` overrides the delay.
    #[must_use]
    pub fn standard(config: RetryConfig) -> Self {
        Self::new(config, classify::is_retryable)
            .delay_override(|e| classify::retry_after_ms(e).map(Duration::from_millis))
    }
}

/// Run `op` under `policy`.
///
/// `op` receives the 0-based attempt index. Fails with the most recent error
/// once retries are exhausted, or immediately when the classifier refuses.
///
/// # Errors
/// Returns the last error produced by `op`.
pub async fn retry<T, E, Op, Fut>(policy: &RetryPolicy<E>, op: Op) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(policy, op, |_, _, _| async {}).await
}

/// Like [`retry`], with an async hook awaited after `on_retry` and before the sleep.
///
/// The hook sees `(error, retry_number, delay)` where `retry_number` starts at 1.
///
/// # Errors
/// Returns the last error produced by `op`.
pub async fn retry_with<T, E, Op, Fut, Hook, HookFut>(
    policy: &RetryPolicy<E>,
    mut op: Op,
    mut before_sleep: Hook,
) -> Result<T, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Hook: FnMut(&E, u32, Duration) -> HookFut,
    HookFut: Future<Output = ()>,
{
    let cfg = policy.config;
    let mut attempt: u32 = 0;
    loop {
        let err = match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        if !cfg.enabled || attempt >= cfg.max_retries || !policy.is_retryable(&err) {
            return Err(err);
        }

        let delay = policy.delay_for(attempt, &err);
        let retry_number = attempt + 1;
        if let Some(cb) = &policy.on_retry {
            cb(&err, retry_number, delay);
        }
        before_sleep(&err, retry_number, delay).await;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry = retry_number,
            max_retries = cfg.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying after failure"
        );

        tokio::time::sleep(delay).await;
        attempt = retry_number;
    }
}
