//! Evidence validation agent
//!
//! Wraps the evidence validator: takes the candidate themes plus the pages
//! gathered during discovery and produces a per-destination validation
//! report with per-theme evidence dossiers.

use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use crate::evidence::{EvidenceDedupRegistry, EvidenceValidator};
use crate::models::{AgentResponse, TaskDefinition, ThemeData, WebContent};

use super::{destination_from, elapsed_secs, Agent};

const AGENT_ID: &str = "evidence_validation_agent";

pub struct EvidenceValidationAgent {
    validator: EvidenceValidator,
    dedup: Option<Mutex<EvidenceDedupRegistry>>,
}

impl EvidenceValidationAgent {
    pub fn new(validator: EvidenceValidator) -> Self {
        Self {
            validator,
            dedup: None,
        }
    }

    /// Track accepted evidence across runs so repeat validations of the
    /// same destination can be attributed to already-known sources
    pub fn with_dedup_registry(mut self, registry: EvidenceDedupRegistry) -> Self {
        self.dedup = Some(Mutex::new(registry));
        self
    }
}

#[async_trait]
impl Agent for EvidenceValidationAgent {
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

        let themes: Vec<ThemeData> = match task
            .data
            .get("themes")
            .map(|v| serde_json::from_value(v.clone()))
        {
            Some(Ok(themes)) => themes,
            Some(Err(err)) => {
                return AgentResponse::error(
                    &format!("malformed themes payload: {}", err),
                    AGENT_ID,
                    task_id,
                    elapsed_secs(start),
                )
            }
            None => Vec::new(),
        };
        let pages: Vec<WebContent> = task
            .data
            .get("pages")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let pairs: Vec<(String, String)> = themes
            .iter()
            .map(|t| (t.theme.clone(), t.category.clone()))
            .collect();
        let report = self.validator.build_report(&pairs, &pages, &destination).await;

        if let Some(dedup) = &self.dedup {
            if let Ok(mut registry) = dedup.lock() {
                for evidence in &report.theme_evidence {
                    registry.register(&evidence.theme, &destination, evidence.pieces.clone());
                }
            }
        }

        match serde_json::to_value(&report) {
            Ok(data) => AgentResponse::success(data, AGENT_ID, task_id, elapsed_secs(start)),
            Err(err) => AgentResponse::error(
                &format!("failed to serialize evidence report: {}", err),
                AGENT_ID,
                task_id,
                elapsed_secs(start),
            ),
        }
    }
}
