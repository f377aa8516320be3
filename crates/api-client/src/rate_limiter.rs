use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes calls to one upstream across every caller sharing it.
///
/// The limiter is a single lock around a single last-grant timestamp:
/// `acquire` waits until at least `60 / calls_per_minute` seconds have
/// passed since the previous grant, then records its own grant. Because
/// the lock is held across the wait, concurrent callers queue up and are
/// released one by one at the configured spacing.
///
/// It is cheap to clone; clones share the same state. Construct one per
/// upstream and pass it by reference to every client of that upstream
/// rather than reaching for a global, so tests can substitute a fresh instance
/// under `tokio::time::pause`.
#[derive(Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(calls_per_minute: u32) -> Self {
        assert!(calls_per_minute > 0, "calls_per_minute must be positive");
        Self {
            min_interval: Duration::from_secs_f64(60.0 / f64::from(calls_per_minute)),
            last_grant: Arc::new(Mutex::new(None)),
        }
    }

    /// Blocks until the caller may proceed.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::trace!(wait_ms = (ready_at - now).as_millis() as u64, "rate limited");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
