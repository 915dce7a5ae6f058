use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::CacheSettings;
use crate::services::api::ApiError;

/// In-memory TTL cache for catalogs that rarely change
///
/// Values are kept as JSON so one cache can hold differently typed catalogs.
#[derive(Clone)]
pub struct CatalogCache {
    entries: moka::future::Cache<String, Value>,
}

impl CatalogCache {
    pub fn new(settings: &CacheSettings) -> Self {
        let entries = moka::future::CacheBuilder::new(settings.max_entries)
            .time_to_live(Duration::from_secs(settings.ttl_secs))
            .build();

        Self { entries }
    }

    /// Return the cached catalog, or fetch and remember it
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(cached) = self.entries.get(key).await {
            match serde_json::from_value(cached) {
                Ok(value) => {
                    tracing::trace!("Catalog cache hit: {}", key);
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!("Dropping unreadable catalog entry {}: {}", key, e);
                    self.entries.invalidate(key).await;
                }
            }
        }

        tracing::trace!("Catalog cache miss: {}", key);
        let value = fetch().await?;

        match serde_json::to_value(&value) {
            Ok(json) => self.entries.insert(key.to_string(), json).await,
            Err(e) => tracing::warn!("Catalog {} not cached: {}", key, e),
        }

        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
        tracing::debug!("Catalog cache cleared");
    }
}

/// Cache key builder
pub struct CatalogKey;

impl CatalogKey {
    pub const AVATARS: &'static str = "catalog:avatars";
    pub const INTEREST_TAGS: &'static str = "catalog:interest-tags";
    pub const GAME_PRICING: &'static str = "catalog:game-pricing";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> CatalogCache {
        CatalogCache::new(&CacheSettings {
            ttl_secs: 60,
            max_entries: 16,
        })
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let avatars: Vec<String> = cache
                .get_or_fetch(CatalogKey::AVATARS, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["cyber-warrior-01".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(avatars, vec!["cyber-warrior-01"]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = cache();

        let first: Result<Vec<String>, _> = cache
            .get_or_fetch(CatalogKey::INTEREST_TAGS, || async {
                Err(ApiError::InvalidResponse("boom".into()))
            })
            .await;
        assert!(first.is_err());

        let second: Vec<String> = cache
            .get_or_fetch(CatalogKey::INTEREST_TAGS, || async { Ok(vec!["RPG".to_string()]) })
            .await
            .unwrap();
        assert_eq!(second, vec!["RPG"]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = cache();
        let _: Vec<String> = cache
            .get_or_fetch(CatalogKey::AVATARS, || async { Ok(vec!["a".to_string()]) })
            .await
            .unwrap();

        cache.invalidate(CatalogKey::AVATARS).await;

        let refetched: Vec<String> = cache
            .get_or_fetch(CatalogKey::AVATARS, || async { Ok(vec!["b".to_string()]) })
            .await
            .unwrap();
        assert_eq!(refetched, vec!["b"]);
    }
}
