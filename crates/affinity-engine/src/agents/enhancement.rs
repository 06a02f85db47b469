//! Intelligence enhancement agent
//!
//! Enriches baseline themes with discovery-derived context: source-backed
//! rationale, category coverage insights, and small confidence refinements
//! for themes that discovery content corroborates.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::models::{
    AgentResponse, EnhancementResult, TaskDefinition, ThemeData, WebDiscoveryResult,
};

use super::{destination_from, elapsed_secs, Agent};

const AGENT_ID: &str = "intelligence_enhancement_agent";

/// Confidence lift for a theme whose name shows up in discovery content
const CORROBORATION_LIFT: f64 = 0.05;

pub struct EnhancementAgent;

impl EnhancementAgent {
    pub fn new() -> Self {
        Self
    }

    fn enhance(
        &self,
        destination: &str,
        themes: Vec<ThemeData>,
        discovery: Option<&WebDiscoveryResult>,
    ) -> EnhancementResult {
        let corpus: String = discovery
            .map(|d| {
                d.content
                    .iter()
                    .map(|c| format!("{} {}", c.title, c.content))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .unwrap_or_default();

        let mut enhanced = Vec::with_capacity(themes.len());
        let mut corroborated = 0usize;
        for mut theme in themes {
            let mentioned = !corpus.is_empty() && corpus.contains(&theme.theme.to_lowercase());
            if mentioned {
                corroborated += 1;
                theme.confidence = (theme.confidence + CORROBORATION_LIFT).min(1.0);
                theme.rationale = format!(
                    "Mentioned in discovered {} content; corroborated by page text.",
                    destination
                );
            } else if theme.rationale.is_empty() {
                theme.rationale = "Model-generated; awaiting evidence validation.".to_string();
            }
            if theme.description.is_empty() {
                theme.description =
                    format!("{} travelers associate this with {}.", destination, theme.theme);
            }
            enhanced.push(theme);
        }

        let mut category_counts = std::collections::HashMap::new();
        for theme in &enhanced {
            *category_counts.entry(theme.category.clone()).or_insert(0usize) += 1;
        }

        let quality_score = if enhanced.is_empty() {
            0.0
        } else {
            enhanced.iter().map(|t| t.confidence).sum::<f64>() / enhanced.len() as f64
        };

        tracing::info!(
            "[ENHANCEMENT] {}: {} theme(s), {} corroborated by discovery",
            destination,
            enhanced.len(),
            corroborated
        );

        EnhancementResult {
            destination: destination.to_string(),
            enhanced_themes: enhanced,
            insights: json!({
                "corroborated_themes": corroborated,
                "category_counts": category_counts,
                "discovery_pages_considered": discovery.map(|d| d.content.len()).unwrap_or(0),
            }),
            quality_score,
            errors: Vec::new(),
        }
    }
}

impl Default for EnhancementAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for EnhancementAgent {
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

        let themes: Vec<ThemeData> = match task.data.get("themes") {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(themes) => themes,
                Err(err) => {
                    return AgentResponse::error(
                        &format!("malformed themes payload: {}", err),
                        AGENT_ID,
                        task_id,
                        elapsed_secs(start),
                    )
                }
            },
            None => Vec::new(),
        };
        let discovery: Option<WebDiscoveryResult> = task
            .data
            .get("discovery")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let result = self.enhance(&destination, themes, discovery.as_ref());
        match serde_json::to_value(&result) {
            Ok(data) => AgentResponse::success(data, AGENT_ID, task_id, elapsed_secs(start)),
            Err(err) => AgentResponse::error(
                &format!("failed to serialize enhancement result: {}", err),
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
    use crate::models::{TaskStatus, WebContent};

    #[tokio::test]
    async fn test_corroborated_theme_gains_confidence() {
        let agent = EnhancementAgent::new();
        let discovery = WebDiscoveryResult::new(
            "Tokyo",
            vec![WebContent::new(
                "https://example.com",
                "Tokyo nightlife",
                "The izakaya nightlife in Golden Gai is legendary among travelers.",
                0.5,
                0.8,
                0.6,
            )],
            1,
        );
        let themes = vec![
            ThemeData::new("izakaya nightlife", "destination", 0.6),
            ThemeData::new("alpine skiing", "destination", 0.6),
        ];

        let task = TaskDefinition::new(
            "intelligence_enhancement",
            serde_json::json!({
                "destination": "Tokyo",
                "themes": themes,
                "discovery": discovery,
            }),
        );
        let response = agent.execute_task("task-1", &task).await;
        assert_eq!(response.status, TaskStatus::Success);

        let result: EnhancementResult = serde_json::from_value(response.data.unwrap()).unwrap();
        let corroborated = &result.enhanced_themes[0];
        let untouched = &result.enhanced_themes[1];
        assert!((corroborated.confidence - 0.65).abs() < 1e-9);
        assert!((untouched.confidence - 0.6).abs() < 1e-9);
        assert_eq!(result.insights["corroborated_themes"], 1);
    }

    #[tokio::test]
    async fn test_empty_theme_list_yields_zero_quality() {
        let agent = EnhancementAgent::new();
        let task = TaskDefinition::new(
            "intelligence_enhancement",
            serde_json::json!({"destination": "Tokyo", "themes": []}),
        );
        let response = agent.execute_task("task-2", &task).await;
        let result: EnhancementResult = serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(result.quality_score, 0.0);
        assert!(result.enhanced_themes.is_empty());
    }
}
