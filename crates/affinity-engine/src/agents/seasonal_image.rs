//! Seasonal image generation agent
//!
//! Produces one promotional image per season through a pluggable generator
//! backend. Generation failures for a season are recorded in the result
//! rather than failing the phase; a destination with two of four seasonal
//! images is still worth shipping.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{AgentResponse, TaskDefinition};
use crate::retry::RetryPolicy;

use super::{destination_from, elapsed_secs, Agent};

const AGENT_ID: &str = "seasonal_image_agent";

const SEASONS: [&str; 4] = ["spring", "summer", "autumn", "winter"];
const DEFAULT_SIZE: &str = "1024x1024";

/// Backend boundary for image generation; returns the URL (or data URI)
/// of the generated image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, size: &str) -> Result<String, String>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Default generator for deployments without an image backend; every
/// request reports the backend as unconfigured.
pub struct NoopImageGenerator;

#[async_trait]
impl ImageGenerator for NoopImageGenerator {
    async fn generate(&self, _prompt: &str, _size: &str) -> Result<String, String> {
        Err("no image backend configured".to_string())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalImage {
    pub season: String,
    pub prompt: String,
    pub url: String,
}

pub struct SeasonalImageAgent {
    generator: Arc<dyn ImageGenerator>,
    retry: RetryPolicy,
}

impl SeasonalImageAgent {
    pub fn new(generator: Arc<dyn ImageGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    fn build_prompt(destination: &str, season: &str, themes: &[String]) -> String {
        let theme_hint = if themes.is_empty() {
            String::new()
        } else {
            format!(", featuring {}", themes.join(" and "))
        };
        format!(
            "Scenic travel photograph of {} in {}{}. Natural light, no text, no people in focus.",
            destination, season, theme_hint
        )
    }

    async fn generate_all(&self, destination: &str, themes: &[String]) -> (Vec<SeasonalImage>, Vec<String>) {
        let mut images = Vec::new();
        let mut errors = Vec::new();

        if !self.generator.is_configured() {
            tracing::info!(
                "[SEASONAL_IMAGE] {}: image backend not configured, skipping generation",
                destination
            );
            errors.push("image backend not configured".to_string());
            return (images, errors);
        }

        for season in SEASONS {
            let prompt = Self::build_prompt(destination, season, themes);
            let label = format!("image {} {}", destination, season);
            let attempt = self
                .retry
                .run(&label, || self.generator.generate(&prompt, DEFAULT_SIZE))
                .await;
            match attempt {
                Ok(url) => images.push(SeasonalImage {
                    season: season.to_string(),
                    prompt,
                    url,
                }),
                Err(err) => {
                    tracing::warn!("[SEASONAL_IMAGE] {} {}: {}", destination, season, err);
                    errors.push(format!("{}: {}", season, err));
                }
            }
        }
        (images, errors)
    }
}

#[async_trait]
impl Agent for SeasonalImageAgent {
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

        let themes: Vec<String> = task
            .data
            .get("theme_names")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        // Two themes keep the prompt grounded without crowding the scene
        let highlight: Vec<String> = themes.into_iter().take(2).collect();

        let (images, errors) = self.generate_all(&destination, &highlight).await;
        let data = json!({
            "destination": destination,
            "images": images,
            "errors": errors,
            "seasons_covered": images.len(),
        });
        AgentResponse::success(data, AGENT_ID, task_id, elapsed_secs(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    struct FlakyGenerator {
        fail_seasons: Vec<&'static str>,
    }

    #[async_trait]
    impl ImageGenerator for FlakyGenerator {
        async fn generate(&self, prompt: &str, _size: &str) -> Result<String, String> {
            if self.fail_seasons.iter().any(|s| prompt.contains(s)) {
                Err("backend 500".to_string())
            } else {
                Ok(format!("https://images.example.com/{}", prompt.len()))
            }
        }
    }

    #[tokio::test]
    async fn test_partial_failure_still_succeeds_with_errors_recorded() {
        let agent = SeasonalImageAgent::new(
            Arc::new(FlakyGenerator {
                fail_seasons: vec!["winter"],
            }),
            RetryPolicy::none(),
        );
        let task = TaskDefinition::new(
            "seasonal_image_generation",
            serde_json::json!({"destination": "Tokyo", "theme_names": ["cherry blossoms"]}),
        );

        let response = agent.execute_task("task-1", &task).await;
        assert_eq!(response.status, TaskStatus::Success);
        let data = response.data.unwrap();
        assert_eq!(data["seasons_covered"], 3);
        assert_eq!(data["errors"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_noop_generator_skips_without_failing_phase() {
        let agent = SeasonalImageAgent::new(Arc::new(NoopImageGenerator), RetryPolicy::none());
        let task = TaskDefinition::new(
            "seasonal_image_generation",
            serde_json::json!({"destination": "Tokyo"}),
        );
        let response = agent.execute_task("task-2", &task).await;
        assert_eq!(response.status, TaskStatus::Success);
        let data = response.data.unwrap();
        assert_eq!(data["seasons_covered"], 0);
    }
}
