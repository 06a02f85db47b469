//! Web discovery agent
//!
//! Runs a small set of destination queries against the search client and
//! turns the hits into scored page content for downstream phases.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::evidence::validator::{classify_source, score_authority};
use crate::models::{AgentResponse, TaskDefinition, WebContent, WebDiscoveryResult};
use crate::search::SearchClient;

use super::{destination_from, elapsed_secs, Agent};

const AGENT_ID: &str = "web_discovery_agent";

fn discovery_queries(destination: &str) -> Vec<String> {
    vec![
        format!("{} travel guide", destination),
        format!("{} local culture traditions", destination),
        format!("things to do in {}", destination),
        format!("{} neighborhoods districts", destination),
    ]
}

pub struct WebDiscoveryAgent {
    search: Arc<SearchClient>,
    results_per_query: usize,
}

impl WebDiscoveryAgent {
    pub fn new(search: Arc<SearchClient>) -> Self {
        Self {
            search,
            results_per_query: 5,
        }
    }

    /// Content quality from description length; short snippets carry little
    /// evidence value
    fn quality_of(description: &str) -> f64 {
        let len = description.chars().count() as f64;
        (len / 400.0).min(1.0)
    }

    async fn discover(&self, destination: &str) -> WebDiscoveryResult {
        let queries = discovery_queries(destination);
        let mut content: Vec<WebContent> = Vec::new();
        let mut errors = Vec::new();
        let mut analyzed = 0usize;

        for query in &queries {
            match self.search.search(query, self.results_per_query).await {
                Ok(results) => {
                    analyzed += results.len();
                    for hit in results {
                        if hit.url.is_empty() || content.iter().any(|c| c.url == hit.url) {
                            continue;
                        }
                        let source_type = classify_source(&hit.url, &hit.title);
                        let authority = score_authority(&hit.url, source_type);
                        let quality = Self::quality_of(&hit.description);
                        content.push(WebContent::new(
                            &hit.url,
                            &hit.title,
                            &hit.description,
                            0.5,
                            quality,
                            authority,
                        ));
                    }
                }
                Err(err) => {
                    tracing::warn!("[DISCOVERY] query '{}' failed: {}", query, err);
                    errors.push(format!("{}: {}", query, err));
                }
            }
        }

        let mut result = WebDiscoveryResult::new(destination, content, analyzed);
        result.errors = errors;
        tracing::info!(
            "[DISCOVERY] {}: {} page(s) from {} hit(s), avg quality {:.2}",
            destination,
            result.sources_successful,
            result.sources_analyzed,
            result.average_quality
        );
        result
    }
}

#[async_trait]
impl Agent for WebDiscoveryAgent {
    fn agent_id(&self) -> &str {
        AGENT_ID
    }

    async fn execute_task(&self, task_id: &str, task: &TaskDefinition) -> AgentResponse {
        let start = Instant::now();
        let Some(destination) = destination_from(task) else {
            return AgentResponse::error(
                "missing destination in task data",
                AGENT_ID,
                task_id,
                elapsed_secs(start),
            );
        };

        let result = self.discover(&destination).await;
        // All queries failing with zero content is an error for this phase;
        // the orchestrator decides whether to retry the pipeline
        if result.content.is_empty() && !result.errors.is_empty() {
            return AgentResponse::error(
                &format!("discovery produced no content: {}", result.errors.join("; ")),
                AGENT_ID,
                task_id,
                elapsed_secs(start),
            );
        }

        match serde_json::to_value(&result) {
            Ok(data) => AgentResponse::success(data, AGENT_ID, task_id, elapsed_secs(start)),
            Err(err) => AgentResponse::error(
                &format!("failed to serialize discovery result: {}", err),
                AGENT_ID,
                task_id,
                elapsed_secs(start),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::retry::RetryPolicy;
    use crate::search::client::test_support::StaticSearch;
    use crate::search::SearchResult;

    fn hit(url: &str, title: &str, description: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            authority_score: None,
        }
    }

    #[tokio::test]
    async fn test_discovery_deduplicates_urls_across_queries() {
        let long_desc = "a".repeat(400);
        let backend = StaticSearch::new(vec![
            (
                "Tokyo travel guide",
                vec![hit("https://www.japan.gov/guide", "Guide", &long_desc)],
            ),
            (
                "things to do in Tokyo",
                vec![hit("https://www.japan.gov/guide", "Guide", &long_desc)],
            ),
        ]);
        let agent = WebDiscoveryAgent::new(Arc::new(SearchClient::new(
            Arc::new(backend),
            RetryPolicy::none(),
        )));

        let task = TaskDefinition::new("web_discovery", serde_json::json!({"destination": "Tokyo"}));
        let response = agent.execute_task("task-1", &task).await;

        assert_eq!(response.status, TaskStatus::Success);
        let result: WebDiscoveryResult =
            serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(result.content.len(), 1);
        assert_eq!(result.sources_analyzed, 2);
        assert!((result.content[0].quality_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_destination_is_error_envelope() {
        let backend = StaticSearch::new(vec![]);
        let agent = WebDiscoveryAgent::new(Arc::new(SearchClient::new(
            Arc::new(backend),
            RetryPolicy::none(),
        )));

        let task = TaskDefinition::new("web_discovery", serde_json::json!({}));
        let response = agent.execute_task("task-2", &task).await;
        assert_eq!(response.status, TaskStatus::Error);
        assert_eq!(response.agent_id, "web_discovery_agent");
    }
}
