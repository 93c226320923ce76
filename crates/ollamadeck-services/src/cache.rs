use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ollamadeck_core::ModelRecord;
use tracing::{debug, warn};

use crate::ollama::{OllamaClient, OllamaError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    models: Vec<ModelRecord>,
    fetched_at: Instant,
}

/// TTL cache of the inference server's model list. Refresh failures fall
/// back to the last good snapshot; callers never see an error, at worst an
/// empty list.
pub struct ModelCache {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry>>,
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub async fn get(&self, client: &OllamaClient, force_refresh: bool) -> Vec<ModelRecord> {
        self.get_with(force_refresh, || client.list_models()).await
    }

    /// Cache logic with the fetch abstracted out, so the refresh policy is
    /// testable without a live server.
    pub async fn get_with<F, Fut>(&self, force_refresh: bool, fetch: F) -> Vec<ModelRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ModelRecord>, OllamaError>>,
    {
        if !force_refresh {
            let entry = self.entry.lock().unwrap();
            if let Some(cached) = entry.as_ref() {
                if cached.fetched_at.elapsed() <= self.ttl {
                    debug!(count = cached.models.len(), "serving cached model list");
                    return cached.models.clone();
                }
            }
        }

        match fetch().await {
            Ok(models) => {
                let mut entry = self.entry.lock().unwrap();
                *entry = Some(CacheEntry {
                    models: models.clone(),
                    fetched_at: Instant::now(),
                });
                models
            }
            Err(e) => {
                warn!("model list refresh failed, using last good cache: {e}");
                let entry = self.entry.lock().unwrap();
                entry
                    .as_ref()
                    .map(|cached| cached.models.clone())
                    .unwrap_or_default()
            }
        }
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn model(name: &str) -> ModelRecord {
        ModelRecord {
            name: name.to_string(),
            size: 0,
            modified_at: String::new(),
            digest: String::new(),
            size_formatted: String::new(),
            modified_at_formatted: String::new(),
        }
    }

    #[tokio::test]
    async fn cached_list_is_not_refetched_within_ttl() {
        let cache = ModelCache::new(Duration::from_secs(30));
        let fetches = AtomicUsize::new(0);

        let first = cache
            .get_with(false, || {
                fetches.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![model("llama3")]) }
            })
            .await;
        assert_eq!(first.len(), 1);

        let second = cache
            .get_with(false, || {
                fetches.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![model("llama3"), model("phi3")]) }
            })
            .await;
        assert_eq!(second.len(), 1, "fresh cache should be served as-is");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_ttl() {
        let cache = ModelCache::new(Duration::from_secs(30));

        cache
            .get_with(false, || async { Ok(vec![model("llama3")]) })
            .await;
        let refreshed = cache
            .get_with(true, || async { Ok(vec![model("llama3"), model("phi3")]) })
            .await;
        assert_eq!(refreshed.len(), 2);
    }

    #[tokio::test]
    async fn refresh_failure_falls_back_to_last_good_cache() {
        let cache = ModelCache::new(Duration::from_secs(30));

        cache
            .get_with(false, || async { Ok(vec![model("llama3")]) })
            .await;
        let fallback = cache
            .get_with(true, || async {
                Err(OllamaError::Malformed("boom".to_string()))
            })
            .await;
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].name, "llama3");
    }

    #[tokio::test]
    async fn refresh_failure_with_no_cache_yields_empty_list() {
        let cache = ModelCache::new(Duration::from_secs(30));
        let result = cache
            .get_with(false, || async {
                Err(OllamaError::Malformed("boom".to_string()))
            })
            .await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn expired_cache_is_refetched() {
        let cache = ModelCache::new(Duration::from_millis(1));

        cache
            .get_with(false, || async { Ok(vec![model("llama3")]) })
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let refreshed = cache
            .get_with(false, || async { Ok(vec![model("phi3")]) })
            .await;
        assert_eq!(refreshed[0].name, "phi3");
    }
}
