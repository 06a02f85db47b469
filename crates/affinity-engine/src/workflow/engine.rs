//! Destination workflow orchestrator
//!
//! Drives one destination through the phase sequence, gates on discovery
//! quality with full-pipeline restarts, runs the two enhancement branches
//! concurrently, and always hands back a `WorkflowResult` whether the run
//! succeeded or died mid-phase.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::models::{
    EnhancementResult, EvidenceValidationReport, LlmProcessingResult, QualityAssuranceResult,
    TaskDefinition, ThemeData, ThemeEvidence, WebDiscoveryResult, WorkflowResult,
};
use crate::reconcile::ReconcileEngine;
use crate::sink::{AffinityGraphSink, AffinityUpdate};

use super::outcome::unwrap_phase_result;
use super::phases::{weighted_quality, WorkflowPhase};
use crate::agents::Agent;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkflowConfig {
    /// Full-pipeline restarts allowed when discovery quality gates low
    pub max_workflow_retries: u32,
    pub max_parallel_destinations: usize,
    pub discovery_quality_threshold: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_workflow_retries: 2,
            max_parallel_destinations: 3,
            discovery_quality_threshold: 0.5,
        }
    }
}

/// Mutable state for one destination run
struct WorkflowState {
    workflow_id: Uuid,
    destination: String,
    phases_completed: Vec<String>,
    phase_scores: HashMap<String, f64>,
    errors: Vec<String>,
    started: Instant,
}

impl WorkflowState {
    fn new(destination: &str) -> Self {
        Self {
            workflow_id: Uuid::new_v4(),
            destination: destination.to_string(),
            phases_completed: Vec::new(),
            phase_scores: HashMap::new(),
            errors: Vec::new(),
            started: Instant::now(),
        }
    }

    fn complete_phase(&mut self, phase: WorkflowPhase) {
        self.phases_completed.push(phase.as_str().to_string());
    }

    fn score(&mut self, key: &str, value: f64) {
        self.phase_scores.insert(key.to_string(), value);
    }

    fn finish(self, success: bool, final_data: Value) -> WorkflowResult {
        let quality_score = weighted_quality(&self.phase_scores);
        WorkflowResult {
            workflow_id: self.workflow_id,
            destination: self.destination,
            success,
            final_data,
            quality_score,
            phases_completed: self.phases_completed,
            error_messages: self.errors,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

pub struct WorkflowEngine {
    discovery: Arc<dyn Agent>,
    llm_processing: Arc<dyn Agent>,
    enhancement: Arc<dyn Agent>,
    evidence: Arc<dyn Agent>,
    images: Arc<dyn Agent>,
    qa: Arc<dyn Agent>,
    reconcile: ReconcileEngine,
    sink: Option<Arc<dyn AffinityGraphSink>>,
    config: WorkflowConfig,
}

impl WorkflowEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        discovery: Arc<dyn Agent>,
        llm_processing: Arc<dyn Agent>,
        enhancement: Arc<dyn Agent>,
        evidence: Arc<dyn Agent>,
        images: Arc<dyn Agent>,
        qa: Arc<dyn Agent>,
        reconcile: ReconcileEngine,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            discovery,
            llm_processing,
            enhancement,
            evidence,
            images,
            qa,
            reconcile,
            sink: None,
            config,
        }
    }

    /// Publish each successful run's affinity set to a knowledge-graph sink
    pub fn with_sink(mut self, sink: Arc<dyn AffinityGraphSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Gate score for the discovery phase: half content quality, half
    /// source coverage (five distinct pages counts as full coverage)
    fn discovery_gate_score(result: &WebDiscoveryResult) -> f64 {
        let coverage = (result.sources_successful as f64 / 5.0).min(1.0);
        0.5 * result.average_quality + 0.5 * coverage
    }

    /// Run the whole pipeline for one destination. Never errors: fatal
    /// phase failures come back as an unsuccessful `WorkflowResult`.
    pub async fn run_destination(&self, destination: &str) -> WorkflowResult {
        let mut restarts = 0u32;
        loop {
            let mut state = WorkflowState::new(destination);
            state.complete_phase(WorkflowPhase::Initialization);
            tracing::info!(
                "[WORKFLOW_ENGINE] {} starting workflow {} (attempt {})",
                destination,
                state.workflow_id,
                restarts + 1
            );

            // web discovery, gated on quality
            let discovery = match self.run_discovery(&mut state).await {
                Ok(result) => result,
                Err(err) => {
                    state.errors.push(format!("web_discovery: {}", err));
                    return state.finish(false, Value::Null);
                }
            };
            let gate = Self::discovery_gate_score(&discovery);
            if gate < self.config.discovery_quality_threshold
                && restarts < self.config.max_workflow_retries
            {
                restarts += 1;
                tracing::warn!(
                    "[WORKFLOW_ENGINE] {} discovery gate {:.2} below {:.2}, restarting ({}/{})",
                    destination,
                    gate,
                    self.config.discovery_quality_threshold,
                    restarts,
                    self.config.max_workflow_retries
                );
                continue;
            }
            if gate < self.config.discovery_quality_threshold {
                // Retries exhausted: proceed with what discovery produced
                state.errors.push(format!(
                    "discovery quality {:.2} below threshold after {} restart(s)",
                    gate, restarts
                ));
            }
            state.score("web_discovery", gate);

            return self.run_pipeline(state, discovery).await;
        }
    }

    async fn run_discovery(
        &self,
        state: &mut WorkflowState,
    ) -> Result<WebDiscoveryResult, String> {
        let task = TaskDefinition::new(
            "web_discovery",
            json!({"destination": &state.destination}),
        );
        let response = self
            .discovery
            .execute_task(&format!("{}-discovery", state.workflow_id), &task)
            .await;
        if !response.is_success() {
            return Err(response.error_message.unwrap_or_else(|| "unknown".to_string()));
        }
        state.complete_phase(WorkflowPhase::WebDiscovery);
        let payload = unwrap_phase_result(response.data.unwrap_or(Value::Null));
        serde_json::from_value(payload).map_err(|err| format!("malformed result: {}", err))
    }

    async fn run_pipeline(
        &self,
        mut state: WorkflowState,
        discovery: WebDiscoveryResult,
    ) -> WorkflowResult {
        let destination = state.destination.clone();
        let workflow_id = state.workflow_id;

        // llm processing
        let task = TaskDefinition::new("llm_processing", json!({"destination": &destination}));
        let response = self
            .llm_processing
            .execute_task(&format!("{}-llm", workflow_id), &task)
            .await;
        if !response.is_success() {
            let err = response.error_message.unwrap_or_else(|| "unknown".to_string());
            state.errors.push(format!("llm_processing: {}", err));
            return state.finish(false, Value::Null);
        }
        let payload = unwrap_phase_result(response.data.unwrap_or(Value::Null));
        let processing: LlmProcessingResult = match serde_json::from_value(payload) {
            Ok(result) => result,
            Err(err) => {
                state
                    .errors
                    .push(format!("llm_processing: malformed result: {}", err));
                return state.finish(false, Value::Null);
            }
        };
        state.complete_phase(WorkflowPhase::LlmProcessing);
        state.score("llm_processing", processing.quality_score);

        // enhancement and evidence validation run concurrently
        let enhancement_task = TaskDefinition::new(
            "intelligence_enhancement",
            json!({
                "destination": &destination,
                "themes": &processing.themes,
                "discovery": &discovery,
            }),
        );
        let evidence_task = TaskDefinition::new(
            "evidence_validation",
            json!({
                "destination": &destination,
                "themes": &processing.themes,
                "pages": &discovery.content,
            }),
        );
        let enhancement_task_id = format!("{}-enhance", workflow_id);
        let evidence_task_id = format!("{}-evidence", workflow_id);
        let (enhancement_response, evidence_response) = tokio::join!(
            self.enhancement
                .execute_task(&enhancement_task_id, &enhancement_task),
            self.evidence
                .execute_task(&evidence_task_id, &evidence_task),
        );
        state.complete_phase(WorkflowPhase::ParallelEnhancement);

        let enhancement: Option<EnhancementResult> = if enhancement_response.is_success() {
            let payload = unwrap_phase_result(enhancement_response.data.unwrap_or(Value::Null));
            serde_json::from_value(payload).ok()
        } else {
            let err = enhancement_response
                .error_message
                .unwrap_or_else(|| "unknown".to_string());
            state
                .errors
                .push(format!("intelligence_enhancement: {}", err));
            None
        };
        let report: Option<EvidenceValidationReport> = if evidence_response.is_success() {
            let payload = unwrap_phase_result(evidence_response.data.unwrap_or(Value::Null));
            serde_json::from_value(payload).ok()
        } else {
            let err = evidence_response
                .error_message
                .unwrap_or_else(|| "unknown".to_string());
            state.errors.push(format!("evidence_validation: {}", err));
            None
        };

        let mut themes: Vec<ThemeData> = enhancement
            .as_ref()
            .map(|e| e.enhanced_themes.clone())
            .unwrap_or_else(|| processing.themes.clone());
        if let Some(enhancement) = &enhancement {
            state.score("intelligence_enhancement", enhancement.quality_score);
        }
        let mut validated_share = 0.0;
        if let Some(report) = &report {
            state.score("evidence_validation", report.overall_confidence);
            if report.themes_validated > 0 {
                validated_share = (report.validated_count + report.partially_validated_count)
                    as f64
                    / report.themes_validated as f64;
            }
            let evidence_map: HashMap<String, ThemeEvidence> = report
                .theme_evidence
                .iter()
                .map(|e| (e.theme.trim().to_lowercase(), e.clone()))
                .collect();
            let (reconciled, summary) =
                self.reconcile.validate_and_reconcile(themes, &evidence_map).await;
            tracing::info!(
                "[WORKFLOW_ENGINE] {} reconcile: {} in, {} gated out, {} deduplicated, {} out",
                destination,
                summary.input_count,
                summary.gated_out,
                summary.deduplicated,
                summary.output_count
            );
            themes = reconciled;
        }

        // seasonal images; failure degrades the run rather than ending it
        let theme_names: Vec<String> = themes.iter().map(|t| t.theme.clone()).collect();
        let image_task = TaskDefinition::new(
            "seasonal_image_generation",
            json!({"destination": &destination, "theme_names": theme_names}),
        );
        let image_response = self
            .images
            .execute_task(&format!("{}-images", workflow_id), &image_task)
            .await;
        let mut seasons_covered = 0usize;
        let mut image_data = Value::Null;
        if image_response.is_success() {
            state.complete_phase(WorkflowPhase::SeasonalImageGeneration);
            image_data = unwrap_phase_result(image_response.data.unwrap_or(Value::Null));
            seasons_covered = image_data
                .get("seasons_covered")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;
            state.score("seasonal_image_generation", seasons_covered as f64 / 4.0);
        } else {
            let err = image_response.error_message.unwrap_or_else(|| "unknown".to_string());
            state
                .errors
                .push(format!("seasonal_image_generation: {}", err));
        }

        // quality assurance
        let qa_task = TaskDefinition::new(
            "quality_assurance",
            json!({
                "destination": &destination,
                "themes": &themes,
                "validated_share": validated_share,
                "discovery_quality": state.phase_scores.get("web_discovery").copied().unwrap_or(0.0),
                "seasons_covered": seasons_covered,
            }),
        );
        let qa_response = self
            .qa
            .execute_task(&format!("{}-qa", workflow_id), &qa_task)
            .await;
        let mut qa_result = Value::Null;
        if qa_response.is_success() {
            state.complete_phase(WorkflowPhase::QualityAssurance);
            qa_result = unwrap_phase_result(qa_response.data.unwrap_or(Value::Null));
            if let Ok(parsed) = serde_json::from_value::<QualityAssuranceResult>(qa_result.clone())
            {
                state.score("quality_assurance", parsed.overall_score);
            }
        } else {
            let err = qa_response.error_message.unwrap_or_else(|| "unknown".to_string());
            state.errors.push(format!("quality_assurance: {}", err));
        }

        state.complete_phase(WorkflowPhase::Done);
        let final_data = json!({
            "destination": &destination,
            "themes": themes,
            "discovery": {
                "sources_analyzed": discovery.sources_analyzed,
                "sources_successful": discovery.sources_successful,
                "average_quality": discovery.average_quality,
            },
            "evidence_report": report,
            "enhancement_insights": enhancement.map(|e| e.insights),
            "seasonal_images": image_data,
            "quality_assurance": qa_result,
        });
        let mut result = state.finish(true, final_data);

        if let Some(sink) = &self.sink {
            let update = AffinityUpdate::from_result(&result);
            if let Err(err) = sink.publish(&update).await {
                tracing::warn!("[WORKFLOW_ENGINE] {} sink publish failed: {}", destination, err);
                result.error_messages.push(format!("graph_sink: {}", err));
            }
        }
        result
    }

    /// Run several destinations with bounded parallelism. Results come back
    /// in input order, one per destination, failures included.
    pub async fn run_batch(self: Arc<Self>, destinations: &[String]) -> Vec<WorkflowResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_destinations));
        let futures: Vec<_> = destinations
            .iter()
            .map(|destination| {
                let engine = Arc::clone(&self);
                let semaphore = Arc::clone(&semaphore);
                let destination = destination.clone();
                async move {
                    // Closed-semaphore is unreachable; it lives for the batch
                    let _permit = semaphore.acquire().await;
                    engine.run_destination(&destination).await
                }
            })
            .collect();
        futures::future::join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::agents::{EnhancementAgent, QualityAssuranceAgent};
    use crate::models::{AgentResponse, WebContent};
    use crate::reconcile::ReconcileConfig;

    struct CountingDiscovery {
        calls: AtomicU32,
        quality: f64,
        pages: usize,
    }

    /// Low-quality pages on the first call, good ones afterwards
    struct ImprovingDiscovery {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Agent for ImprovingDiscovery {
        fn agent_id(&self) -> &str {
            "web_discovery_agent"
        }

        async fn execute_task(&self, _task_id: &str, task: &TaskDefinition) -> AgentResponse {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let destination = task.data["destination"].as_str().unwrap();
            let (quality, pages) = if call == 0 { (0.3, 1) } else { (0.9, 5) };
            let content: Vec<WebContent> = (0..pages)
                .map(|i| {
                    WebContent::new(
                        &format!("https://travel.example.com/{}", i),
                        "Guide",
                        "Plenty of destination detail in the page body.",
                        0.5,
                        quality,
                        0.7,
                    )
                })
                .collect();
            let result = WebDiscoveryResult::new(destination, content, pages);
            AgentResponse::success(
                serde_json::to_value(result).unwrap(),
                "web_discovery_agent",
                "t",
                0.0,
            )
        }
    }

    #[async_trait]
    impl Agent for CountingDiscovery {
        fn agent_id(&self) -> &str {
            "web_discovery_agent"
        }

        async fn execute_task(&self, _task_id: &str, task: &TaskDefinition) -> AgentResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let destination = task.data["destination"].as_str().unwrap();
            let content: Vec<WebContent> = (0..self.pages)
                .map(|i| {
                    WebContent::new(
                        &format!("https://travel.example.com/{}", i),
                        "Guide",
                        "Detailed destination write-up with plenty of body text.",
                        0.5,
                        self.quality,
                        0.7,
                    )
                })
                .collect();
            let result = WebDiscoveryResult::new(destination, content, self.pages);
            AgentResponse::success(
                serde_json::to_value(result).unwrap(),
                "web_discovery_agent",
                "t",
                0.0,
            )
        }
    }

    struct FixedThemes;

    #[async_trait]
    impl Agent for FixedThemes {
        fn agent_id(&self) -> &str {
            "llm_processing_agent"
        }

        async fn execute_task(&self, _task_id: &str, task: &TaskDefinition) -> AgentResponse {
            let destination = task.data["destination"].as_str().unwrap();
            let themes = vec![
                ThemeData::new("izakaya nightlife", "destination", 0.8),
                ThemeData::new("boutique ryokan stays", "hotel", 0.7),
                ThemeData::new("machiya townhouse rentals", "vacation_rental", 0.7),
            ];
            let result = LlmProcessingResult::new(destination, themes);
            AgentResponse::success(
                serde_json::to_value(result).unwrap(),
                "llm_processing_agent",
                "t",
                0.0,
            )
        }
    }

    struct AlwaysFails {
        id: &'static str,
    }

    #[async_trait]
    impl Agent for AlwaysFails {
        fn agent_id(&self) -> &str {
            self.id
        }

        async fn execute_task(&self, task_id: &str, _task: &TaskDefinition) -> AgentResponse {
            AgentResponse::error("deliberately down", self.id, task_id, 0.0)
        }
    }

    fn engine_with(
        discovery: Arc<dyn Agent>,
        evidence: Arc<dyn Agent>,
        images: Arc<dyn Agent>,
        config: WorkflowConfig,
    ) -> Arc<WorkflowEngine> {
        Arc::new(WorkflowEngine::new(
            discovery,
            Arc::new(FixedThemes),
            Arc::new(EnhancementAgent::new()),
            evidence,
            images,
            Arc::new(QualityAssuranceAgent::new()),
            ReconcileEngine::new(ReconcileConfig::default()),
            config,
        ))
    }

    #[tokio::test]
    async fn test_low_discovery_quality_restarts_then_proceeds() {
        let discovery = Arc::new(CountingDiscovery {
            calls: AtomicU32::new(0),
            quality: 0.1,
            pages: 1,
        });
        let engine = engine_with(
            discovery.clone(),
            Arc::new(AlwaysFails {
                id: "evidence_validation_agent",
            }),
            Arc::new(AlwaysFails {
                id: "seasonal_image_agent",
            }),
            WorkflowConfig::default(),
        );

        let result = engine.run_destination("Tokyo").await;
        // gate = 0.5*0.1 + 0.5*(1/5) = 0.15 < 0.5: two restarts, then proceed
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 3);
        assert!(result.success);
        assert!(result
            .error_messages
            .iter()
            .any(|e| e.contains("below threshold")));
        assert!(result.phases_completed.contains(&"done".to_string()));
    }

    #[tokio::test]
    async fn test_single_restart_when_second_attempt_clears_the_gate() {
        let discovery = Arc::new(ImprovingDiscovery {
            calls: AtomicU32::new(0),
        });
        let engine = engine_with(
            discovery.clone(),
            Arc::new(AlwaysFails {
                id: "evidence_validation_agent",
            }),
            Arc::new(AlwaysFails {
                id: "seasonal_image_agent",
            }),
            WorkflowConfig::default(),
        );

        let result = engine.run_destination("Tokyo").await;
        // first attempt gates at 0.5*0.3 + 0.5*0.2 = 0.25, second at 0.95
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 2);
        assert!(result.success);
        assert!(!result
            .error_messages
            .iter()
            .any(|e| e.contains("below threshold")));
    }

    #[tokio::test]
    async fn test_discovery_failure_yields_failed_result_not_panic() {
        let engine = engine_with(
            Arc::new(AlwaysFails {
                id: "web_discovery_agent",
            }),
            Arc::new(AlwaysFails {
                id: "evidence_validation_agent",
            }),
            Arc::new(AlwaysFails {
                id: "seasonal_image_agent",
            }),
            WorkflowConfig::default(),
        );

        let result = engine.run_destination("Tokyo").await;
        assert!(!result.success);
        assert!(result
            .error_messages
            .iter()
            .any(|e| e.starts_with("web_discovery:")));
    }

    #[tokio::test]
    async fn test_branch_failures_degrade_but_complete() {
        let discovery = Arc::new(CountingDiscovery {
            calls: AtomicU32::new(0),
            quality: 0.9,
            pages: 5,
        });
        let engine = engine_with(
            discovery,
            Arc::new(AlwaysFails {
                id: "evidence_validation_agent",
            }),
            Arc::new(AlwaysFails {
                id: "seasonal_image_agent",
            }),
            WorkflowConfig::default(),
        );

        let result = engine.run_destination("Tokyo").await;
        assert!(result.success);
        assert!(result
            .error_messages
            .iter()
            .any(|e| e.starts_with("evidence_validation:")));
        assert!(result
            .error_messages
            .iter()
            .any(|e| e.starts_with("seasonal_image_generation:")));
        assert!(result.quality_score > 0.0);
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let discovery = Arc::new(CountingDiscovery {
            calls: AtomicU32::new(0),
            quality: 0.9,
            pages: 5,
        });
        let engine = engine_with(
            discovery,
            Arc::new(AlwaysFails {
                id: "evidence_validation_agent",
            }),
            Arc::new(AlwaysFails {
                id: "seasonal_image_agent",
            }),
            WorkflowConfig {
                max_parallel_destinations: 2,
                ..WorkflowConfig::default()
            },
        );

        let destinations = vec![
            "Tokyo".to_string(),
            "Paris".to_string(),
            "Rome".to_string(),
        ];
        let results = engine.run_batch(&destinations).await;
        assert_eq!(results.len(), 3);
        for (result, destination) in results.iter().zip(&destinations) {
            assert_eq!(&result.destination, destination);
        }
    }
}
