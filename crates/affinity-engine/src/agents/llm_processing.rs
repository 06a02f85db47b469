//! LLM orchestration agent
//!
//! Fans the nuance prompts out across every registered model, builds a
//! per-category consensus, and emits the consensus phrases as baseline
//! themes for downstream validation.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::consensus::ConsensusEngine;
use crate::llm::{ClientRegistry, LlmFanout};
use crate::models::{
    AgentResponse, LlmProcessingResult, NuanceCategory, TaskDefinition, ThemeData,
};
use crate::search::{ClaimValidator, SearchClient, SearchError};

use super::{destination_from, elapsed_secs, Agent};

const AGENT_ID: &str = "llm_processing_agent";

/// Confidence assigned to phrases endorsed by multiple models vs. phrases
/// a single model produced
const CONSENSUS_CONFIDENCE: f64 = 0.8;
const UNIQUE_CONFIDENCE: f64 = 0.55;

pub struct LlmProcessingAgent {
    registry: Arc<ClientRegistry>,
    fanout: LlmFanout,
    consensus: ConsensusEngine,
    claims: Option<(Arc<SearchClient>, ClaimValidator)>,
}

impl LlmProcessingAgent {
    pub fn new(
        registry: Arc<ClientRegistry>,
        fanout: LlmFanout,
        consensus: ConsensusEngine,
    ) -> Self {
        Self {
            registry,
            fanout,
            consensus,
            claims: None,
        }
    }

    /// Enable per-phrase web claim validation on the generated themes
    pub fn with_claim_validation(
        mut self,
        search: Arc<SearchClient>,
        validator: ClaimValidator,
    ) -> Self {
        self.claims = Some((search, validator));
        self
    }

    fn category_of(theme: &ThemeData) -> NuanceCategory {
        NuanceCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == theme.category)
            .unwrap_or(NuanceCategory::Destination)
    }

    /// Check each theme against the web; a confirmed claim upgrades its
    /// confidence to the claim score. On backend outage the whole list
    /// drops to the heuristic fallback scorer instead of being dropped.
    async fn validate_claims(
        &self,
        destination: &str,
        themes: &mut [ThemeData],
        errors: &mut Vec<String>,
    ) {
        let Some((search, validator)) = &self.claims else {
            return;
        };

        for index in 0..themes.len() {
            let category = Self::category_of(&themes[index]);
            let phrase = themes[index].theme.clone();
            match validator
                .validate_phrase(search, destination, &phrase, category)
                .await
            {
                Ok(Some(claim)) => {
                    let theme = &mut themes[index];
                    theme.confidence = theme.confidence.max(claim.score);
                    theme.evidence_summary = Some(claim.validation_metadata);
                }
                Ok(None) => {}
                Err(SearchError::Unavailable(reason)) => {
                    errors.push(format!(
                        "search unavailable, using heuristic fallback: {}",
                        reason
                    ));
                    self.fallback_claims(destination, &mut themes[index..]);
                    return;
                }
                Err(err) => {
                    errors.push(format!("claim check '{}': {}", phrase, err));
                }
            }
        }
    }

    fn fallback_claims(&self, destination: &str, themes: &mut [ThemeData]) {
        let Some((_, validator)) = &self.claims else {
            return;
        };
        for category in NuanceCategory::ALL {
            let phrases: Vec<String> = themes
                .iter()
                .filter(|t| Self::category_of(t) == category)
                .map(|t| t.theme.clone())
                .collect();
            for accepted in validator.fallback_validate(destination, &phrases, category) {
                if let Some(theme) = themes
                    .iter_mut()
                    .find(|t| t.theme.eq_ignore_ascii_case(&accepted.phrase))
                {
                    theme.confidence = theme.confidence.max(accepted.score);
                    theme.evidence_summary = Some(accepted.validation_metadata);
                }
            }
        }
    }

    async fn process(&self, destination: &str) -> LlmProcessingResult {
        let generation = self.fanout.generate_all(&self.registry, destination).await;
        let mut themes: Vec<ThemeData> = Vec::new();
        let mut errors: Vec<String> = generation
            .failures
            .iter()
            .map(|f| format!("{}/{}: {}", f.model_id, f.category, f.error))
            .collect();

        for &category in NuanceCategory::ALL.iter() {
            let responses = generation.by_category(category);
            if responses.is_empty() {
                errors.push(format!("no model produced phrases for {}", category));
                continue;
            }
            let result = self.consensus.build_consensus(&responses).await;

            for phrase in &result.consensus {
                themes.push(ThemeData::new(phrase, category.as_str(), CONSENSUS_CONFIDENCE));
            }
            for phrase in &result.unique {
                let already_promoted = result
                    .consensus
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(phrase));
                if !already_promoted {
                    themes.push(ThemeData::new(phrase, category.as_str(), UNIQUE_CONFIDENCE));
                }
            }
            tracing::info!(
                "[LLM_PROCESSING] {} / {}: {} consensus, {} unique",
                destination,
                category,
                result.consensus.len(),
                result.unique.len()
            );
        }

        self.validate_claims(destination, &mut themes, &mut errors)
            .await;

        let mut result = LlmProcessingResult::new(destination, themes);
        result.errors = errors;
        result
    }
}

#[async_trait]
impl Agent for LlmProcessingAgent {
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

        let result = self.process(&destination).await;
        if result.themes.is_empty() {
            return AgentResponse::error(
                &format!("no themes generated: {}", result.errors.join("; ")),
                AGENT_ID,
                task_id,
                elapsed_secs(start),
            );
        }

        match serde_json::to_value(&result) {
            Ok(data) => AgentResponse::success(data, AGENT_ID, task_id, elapsed_secs(start)),
            Err(err) => AgentResponse::error(
                &format!("failed to serialize processing result: {}", err),
                AGENT_ID,
                task_id,
                elapsed_secs(start),
            ),
        }
    }
}
