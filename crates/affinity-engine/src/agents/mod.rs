//! Per-phase task workers
//!
//! Every agent exposes the same `execute_task` contract and answers with the
//! uniform `AgentResponse` envelope, success or error. Agents never panic
//! out of a task; failures come back as error-status responses.

pub mod enhancement;
pub mod evidence_validation;
pub mod llm_processing;
pub mod quality_assurance;
pub mod seasonal_image;
pub mod web_discovery;

use async_trait::async_trait;

use crate::models::{AgentResponse, TaskDefinition};

pub use enhancement::EnhancementAgent;
pub use evidence_validation::EvidenceValidationAgent;
pub use llm_processing::LlmProcessingAgent;
pub use quality_assurance::{QaDecision, QualityAssuranceAgent};
pub use seasonal_image::{ImageGenerator, NoopImageGenerator, SeasonalImageAgent};
pub use web_discovery::WebDiscoveryAgent;

/// The one interface boundary between the orchestrator and every worker
#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_id(&self) -> &str;

    async fn execute_task(&self, task_id: &str, task: &TaskDefinition) -> AgentResponse;
}

/// Seconds elapsed since `start`, for the envelope's processing_time
pub(crate) fn elapsed_secs(start: std::time::Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

/// Extract the destination field every task payload carries
pub(crate) fn destination_from(task: &TaskDefinition) -> Option<String> {
    task.data
        .get("destination")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
