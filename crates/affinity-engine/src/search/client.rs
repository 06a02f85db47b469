//! Web search client
//!
//! Thin wrapper over a search backend (Exa by default) with caching and a
//! shared retry policy. Results come back as ranked {url, title,
//! description} triples.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::cache::SearchCache;
use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Search API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Search response parse error: {0}")]
    ParseError(String),
}

/// One ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Backend-reported authority, when the backend provides one
    pub authority_score: Option<f64>,
}

/// A backend that can answer free-text web queries
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError>;

    fn is_configured(&self) -> bool;
}

/// Exa search API backend
pub struct ExaSearch {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl ExaSearch {
    pub fn new() -> Self {
        let api_key = std::env::var("EXA_API_KEY").ok();
        if api_key.is_none() {
            tracing::warn!("[SEARCH] no Exa API key found (EXA_API_KEY not set)");
        }
        Self {
            client: Client::new(),
            api_key,
            endpoint: "https://api.exa.ai/search".to_string(),
        }
    }
}

impl Default for ExaSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for ExaSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| SearchError::Unavailable("no Exa API key configured".to_string()))?;

        let payload = serde_json::json!({
            "query": query,
            "numResults": limit,
            "contents": { "text": { "maxCharacters": 500 } }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        let results = json["results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let url = item["url"].as_str()?.to_string();
                        Some(SearchResult {
                            url,
                            title: item["title"].as_str().unwrap_or("").to_string(),
                            description: item["text"]
                                .as_str()
                                .or_else(|| item["snippet"].as_str())
                                .unwrap_or("")
                                .to_string(),
                            authority_score: item["score"].as_f64(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Cached, retried search entry point used by validation and discovery
pub struct SearchClient {
    backend: Arc<dyn SearchBackend>,
    cache: Option<Arc<SearchCache>>,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(backend: Arc<dyn SearchBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            cache: None,
            retry,
        }
    }

    pub fn with_cache(mut self, cache: Arc<SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_configured()
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(query).await {
                tracing::debug!("[SEARCH] cache hit for '{}'", query);
                return Ok(cached.as_ref().clone());
            }
        }

        let backend = Arc::clone(&self.backend);
        let results = self
            .retry
            .run("search", || {
                let backend = Arc::clone(&backend);
                let query = query.to_string();
                async move { backend.search(&query, limit).await }
            })
            .await?;

        if let Some(cache) = &self.cache {
            cache.put(query, results.clone()).await;
        }
        Ok(results)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::StaticSearch;
    use super::*;
    use crate::cache::SearchCache;

    #[tokio::test]
    async fn test_search_caches_results() {
        let backend = Arc::new(StaticSearch::new(vec![(
            "tokyo izakaya",
            vec![StaticSearch::hit("https://example.com", "Izakaya")],
        )]));
        let cache = Arc::new(SearchCache::with_defaults());
        let client =
            SearchClient::new(backend, RetryPolicy::none()).with_cache(Arc::clone(&cache));

        let first = client.search("tokyo izakaya", 5).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = client.search("tokyo izakaya", 5).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_unavailable_backend_surfaces_error() {
        let mut backend = StaticSearch::new(vec![]);
        backend.available = false;
        let client = SearchClient::new(Arc::new(backend), RetryPolicy::none());

        let result = client.search("anything", 5).await;
        assert!(matches!(result, Err(SearchError::Unavailable(_))));
    }
}
