use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One memoized upstream response. Entries are replaced wholesale on
/// refetch, never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub fetched_on: NaiveDate,
}

impl CacheEntry {
    /// The two-tier validity rule.
    ///
    /// An entry is usable iff its age is below the TTL AND, when same-day
    /// data is required, it was fetched on the current calendar day. The
    /// calendar check exists because an entry fetched late yesterday can
    /// otherwise outlive midnight while still inside its TTL.
    pub fn is_valid(
        &self,
        now: DateTime<Utc>,
        today: NaiveDate,
        ttl: Duration,
        same_day_required: bool,
    ) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        let within_ttl = age >= chrono::Duration::zero()
            && age < chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let day_ok = !same_day_required || self.fetched_on == today;
        within_ttl && day_ok
    }
}

/// Memoizes externally fetched payloads keyed by query string.
///
/// Reads and writes are guarded by one async lock; the fetch itself runs
/// outside the lock so a slow upstream never blocks unrelated lookups.
/// Clones share state, mirroring `RateLimiter`.
#[derive(Clone, Default)]
pub struct DataCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a cache snapshot from disk. A missing file yields an
    /// empty cache; a corrupt file is an error rather than a silent reset.
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, CacheEntry> = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Deserialization(format!("cache snapshot: {e}")))?;
        Ok(Self {
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    /// Writes the current cache contents to disk as one JSON document.
    pub async fn persist(&self, path: &Path) -> Result<(), ApiError> {
        let entries = self.entries.lock().await;
        let raw = serde_json::to_string(&*entries)
            .map_err(|e| ApiError::Deserialization(format!("cache snapshot: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Returns the cached payload for `key` if it is still valid,
    /// otherwise runs `fetch`, stores the result and returns it.
    pub async fn get<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        same_day_required: bool,
        fetch: F,
    ) -> Result<serde_json::Value, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, ApiError>>,
    {
        let now = Utc::now();
        let today = now.date_naive();

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(key) {
                if entry.is_valid(now, today, ttl, same_day_required) {
                    tracing::debug!(key, "cache hit");
                    return Ok(entry.payload.clone());
                }
                tracing::debug!(key, fetched_on = %entry.fetched_on, "cache entry expired");
            }
        }

        // Fetch outside the lock; re-acquire to write the result back.
        let payload = fetch().await?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                payload: payload.clone(),
                fetched_at: now,
                fetched_on: today,
            },
        );
        Ok(payload)
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().await.insert(key.to_string(), entry);
    }
}
