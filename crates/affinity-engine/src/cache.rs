//! TTL caches for LLM responses and search results

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::search::SearchResult;

/// Cache key derived from request content plus a type discriminator
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CacheKey {
    content_hash: u64,
    request_type: String,
}

impl CacheKey {
    pub fn new(content: &str, request_type: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self {
            content_hash: hasher.finish(),
            request_type: request_type.to_string(),
        }
    }
}

/// Cached LLM response text with provenance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedResponse {
    pub content: String,
    pub cached_at: chrono::DateTime<chrono::Utc>,
    pub provider: String,
    pub model: String,
}

/// Hit/miss statistics for a cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug)]
struct Counters {
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn stats(&self, entry_count: u64) -> CacheStats {
        let hits = self.hits.load(std::sync::atomic::Ordering::Relaxed);
        let misses = self.misses.load(std::sync::atomic::Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entry_count,
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// TTL cache for LLM response text
#[derive(Debug)]
pub struct LlmCache {
    cache: Cache<CacheKey, Arc<CachedResponse>>,
    counters: Counters,
}

impl LlmCache {
    pub fn new(max_capacity: u64, ttl_seconds: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build(),
            counters: Counters::new(),
        }
    }

    /// 1000 entries, 1 hour TTL
    pub fn with_defaults() -> Self {
        Self::new(1000, 3600)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<CachedResponse>> {
        let result = self.cache.get(key).await;
        self.counters.record(result.is_some());
        result
    }

    pub async fn put(&self, key: CacheKey, response: CachedResponse) {
        self.cache.insert(key, Arc::new(response)).await;
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.stats(self.cache.entry_count())
    }
}

/// TTL cache for search result lists, keyed by normalized query
#[derive(Debug)]
pub struct SearchCache {
    cache: Cache<CacheKey, Arc<Vec<SearchResult>>>,
    counters: Counters,
}

impl SearchCache {
    pub fn new(max_capacity: u64, ttl_seconds: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build(),
            counters: Counters::new(),
        }
    }

    /// 2000 queries, 30 minute TTL
    pub fn with_defaults() -> Self {
        Self::new(2000, 1800)
    }

    pub fn key_for_query(query: &str) -> CacheKey {
        CacheKey::new(&query.trim().to_lowercase(), "search")
    }

    pub async fn get(&self, query: &str) -> Option<Arc<Vec<SearchResult>>> {
        let result = self.cache.get(&Self::key_for_query(query)).await;
        self.counters.record(result.is_some());
        result
    }

    pub async fn put(&self, query: &str, results: Vec<SearchResult>) {
        self.cache
            .insert(Self::key_for_query(query), Arc::new(results))
            .await;
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.stats(self.cache.entry_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_key_discriminates_type() {
        let key1 = CacheKey::new("Tokyo nuances", "llm");
        let key2 = CacheKey::new("Tokyo nuances", "llm");
        let key3 = CacheKey::new("Tokyo nuances", "search");
        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[tokio::test]
    async fn test_llm_cache_put_get_stats() {
        let cache = LlmCache::new(10, 60);
        let key = CacheKey::new("prompt", "llm");

        assert!(cache.get(&key).await.is_none());

        cache
            .put(
                key.clone(),
                CachedResponse {
                    content: "response".to_string(),
                    cached_at: chrono::Utc::now(),
                    provider: "openai".to_string(),
                    model: "gpt-4o-mini".to_string(),
                },
            )
            .await;

        let cached = cache.get(&key).await.unwrap();
        assert_eq!(cached.content, "response");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_search_cache_normalizes_query() {
        let cache = SearchCache::new(10, 60);
        cache
            .put(
                "  Tokyo Travel  ",
                vec![SearchResult {
                    url: "https://example.com".to_string(),
                    title: "Tokyo".to_string(),
                    description: "guide".to_string(),
                    authority_score: None,
                }],
            )
            .await;

        let hit = cache.get("tokyo travel").await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().len(), 1);
    }
}
