use crate::error::ApiError;
use configuration::RetrySettings;
use std::future::Future;
use std::time::Duration;

/// Wraps upstream calls with classification-aware retry.
///
/// Transient failures are retried up to `max_attempts` with exponential
/// backoff; an upstream-provided retry-after hint overrides the computed
/// delay for that attempt. Permanent failures surface immediately; the
/// request is wrong and repetition cannot fix it.
#[derive(Clone)]
pub struct RetryingClient {
    settings: RetrySettings,
}

impl RetryingClient {
    pub fn new(settings: RetrySettings) -> Self {
        Self { settings }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempt
    /// budget is exhausted. Exhaustion wraps the last failure so the
    /// caller can still see what actually went wrong.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut delay = Duration::from_millis(self.settings.initial_delay_ms);
        let mut last: Option<ApiError> = None;

        for attempt in 1..=self.settings.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt < self.settings.max_attempts {
                        let wait = e.retry_after().unwrap_or(delay);
                        tracing::warn!(
                            attempt,
                            max_attempts = self.settings.max_attempts,
                            wait_ms = wait.as_millis() as u64,
                            error = %e,
                            "transient upstream failure, retrying"
                        );
                        tokio::time::sleep(wait).await;
                        delay = delay.mul_f64(self.settings.backoff_factor);
                    }
                    last = Some(e);
                }
            }
        }

        Err(ApiError::Exhausted {
            attempts: self.settings.max_attempts,
            last: Box::new(last.unwrap_or_else(|| {
                ApiError::InvalidData("retry loop exited without an error".to_string())
            })),
        })
    }
}
