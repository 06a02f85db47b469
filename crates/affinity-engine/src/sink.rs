//! Knowledge-graph sink boundary
//!
//! The engine hands a destination's reconciled affinity set to a sink and
//! moves on; how the collaborator turns it into graph updates is its own
//! business. Publish failures degrade the run, they never fail it.

use async_trait::async_trait;

use crate::models::{ThemeData, WorkflowResult};

/// One destination's reconciled affinity set, ready for materialization
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AffinityUpdate {
    pub destination: String,
    pub themes: Vec<ThemeData>,
    pub quality_score: f64,
}

impl AffinityUpdate {
    pub fn from_result(result: &WorkflowResult) -> Self {
        let themes = result
            .final_data
            .get("themes")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        Self {
            destination: result.destination.clone(),
            themes,
            quality_score: result.quality_score,
        }
    }
}

#[async_trait]
pub trait AffinityGraphSink: Send + Sync {
    async fn publish(&self, update: &AffinityUpdate) -> Result<(), String>;
}

/// Sink for deployments without a graph backend; logs and discards
pub struct NoopGraphSink;

#[async_trait]
impl AffinityGraphSink for NoopGraphSink {
    async fn publish(&self, update: &AffinityUpdate) -> Result<(), String> {
        tracing::debug!(
            "[GRAPH_SINK] discarding {} theme(s) for {} (no sink configured)",
            update.themes.len(),
            update.destination
        );
        Ok(())
    }
}
