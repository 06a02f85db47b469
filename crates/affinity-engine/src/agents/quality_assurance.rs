//! Quality assurance agent
//!
//! Final gate of the pipeline. Runs a fixed checklist over the assembled
//! destination data, scores it by pass ratio, and recommends whether the
//! run is good to ship, worth retrying, or needs a human look.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{
    AgentResponse, NuanceCategory, QualityAssuranceResult, TaskDefinition, ThemeData,
};

use super::{destination_from, elapsed_secs, Agent};

const AGENT_ID: &str = "quality_assurance_agent";

const MIN_THEMES: usize = 5;
const MIN_VALIDATED_SHARE: f64 = 0.5;
const MIN_AVG_CONFIDENCE: f64 = 0.6;
const MIN_DISCOVERY_QUALITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaDecision {
    Approve,
    Retry,
    Escalate,
}

impl QaDecision {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            QaDecision::Approve
        } else if score >= 0.5 {
            QaDecision::Retry
        } else {
            QaDecision::Escalate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QaDecision::Approve => "approve",
            QaDecision::Retry => "retry",
            QaDecision::Escalate => "escalate",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct QaCheck {
    name: &'static str,
    passed: bool,
    detail: String,
}

pub struct QualityAssuranceAgent;

impl QualityAssuranceAgent {
    pub fn new() -> Self {
        Self
    }

    fn run_checklist(
        themes: &[ThemeData],
        validated_share: f64,
        discovery_quality: f64,
        seasons_covered: usize,
    ) -> Vec<QaCheck> {
        let avg_confidence = if themes.is_empty() {
            0.0
        } else {
            themes.iter().map(|t| t.confidence).sum::<f64>() / themes.len() as f64
        };
        let categories_present = NuanceCategory::ALL
            .iter()
            .filter(|c| themes.iter().any(|t| t.category == c.as_str()))
            .count();

        vec![
            QaCheck {
                name: "minimum_theme_count",
                passed: themes.len() >= MIN_THEMES,
                detail: format!("{} theme(s), minimum {}", themes.len(), MIN_THEMES),
            },
            QaCheck {
                name: "category_coverage",
                passed: categories_present == NuanceCategory::ALL.len(),
                detail: format!(
                    "{}/{} categories represented",
                    categories_present,
                    NuanceCategory::ALL.len()
                ),
            },
            QaCheck {
                name: "validated_share",
                passed: validated_share >= MIN_VALIDATED_SHARE,
                detail: format!(
                    "{:.0}% of themes at least partially validated, minimum {:.0}%",
                    validated_share * 100.0,
                    MIN_VALIDATED_SHARE * 100.0
                ),
            },
            QaCheck {
                name: "average_confidence",
                passed: avg_confidence >= MIN_AVG_CONFIDENCE,
                detail: format!(
                    "average confidence {:.2}, minimum {:.2}",
                    avg_confidence, MIN_AVG_CONFIDENCE
                ),
            },
            QaCheck {
                name: "discovery_quality",
                passed: discovery_quality >= MIN_DISCOVERY_QUALITY,
                detail: format!(
                    "discovery quality {:.2}, minimum {:.2}",
                    discovery_quality, MIN_DISCOVERY_QUALITY
                ),
            },
            QaCheck {
                name: "seasonal_coverage",
                passed: seasons_covered >= 2,
                detail: format!("{}/4 seasonal images generated", seasons_covered),
            },
        ]
    }

    fn evaluate(
        &self,
        destination: &str,
        themes: &[ThemeData],
        validated_share: f64,
        discovery_quality: f64,
        seasons_covered: usize,
    ) -> (QualityAssuranceResult, QaDecision) {
        let checks = Self::run_checklist(themes, validated_share, discovery_quality, seasons_covered);
        let passed = checks.iter().filter(|c| c.passed).count();
        let overall_score = passed as f64 / checks.len() as f64;
        let decision = QaDecision::from_score(overall_score);

        let interventions: Vec<String> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect();
        let mut recommendations = Vec::new();
        if checks.iter().any(|c| c.name == "validated_share" && !c.passed) {
            recommendations
                .push("broaden discovery queries to gather more corroborating pages".to_string());
        }
        if checks.iter().any(|c| c.name == "category_coverage" && !c.passed) {
            recommendations.push("re-run generation for the missing nuance categories".to_string());
        }

        tracing::info!(
            "[QA] {}: {}/{} checks passed, score {:.2}, decision {}",
            destination,
            passed,
            checks.len(),
            overall_score,
            decision.as_str()
        );

        let result = QualityAssuranceResult {
            destination: destination.to_string(),
            quality_metrics: json!({
                "checks": checks,
                "checks_passed": passed,
                "checks_total": checks.len(),
                "decision": decision.as_str(),
            }),
            interventions,
            recommendations,
            overall_score,
        };
        (result, decision)
    }
}

impl Default for QualityAssuranceAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for QualityAssuranceAgent {
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

        let themes: Vec<ThemeData> = task
            .data
            .get("themes")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let validated_share = task
            .data
            .get("validated_share")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let discovery_quality = task
            .data
            .get("discovery_quality")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let seasons_covered = task
            .data
            .get("seasons_covered")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let (result, _decision) = self.evaluate(
            &destination,
            &themes,
            validated_share,
            discovery_quality,
            seasons_covered,
        );
        match serde_json::to_value(&result) {
            Ok(data) => AgentResponse::success(data, AGENT_ID, task_id, elapsed_secs(start)),
            Err(err) => AgentResponse::error(
                &format!("failed to serialize qa result: {}", err),
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

    fn themed(category: &str, n: usize) -> Vec<ThemeData> {
        (0..n)
            .map(|i| ThemeData::new(&format!("theme {}", i), category, 0.8))
            .collect()
    }

    #[test]
    fn test_decision_thresholds() {
        assert_eq!(QaDecision::from_score(0.85), QaDecision::Approve);
        assert_eq!(QaDecision::from_score(0.8), QaDecision::Approve);
        assert_eq!(QaDecision::from_score(0.6), QaDecision::Retry);
        assert_eq!(QaDecision::from_score(0.4), QaDecision::Escalate);
    }

    #[tokio::test]
    async fn test_strong_run_is_approved() {
        let agent = QualityAssuranceAgent::new();
        let mut themes = themed("hotel", 4);
        themes.extend(themed("vacation_rental", 3));
        themes.extend(themed("destination", 3));

        let task = TaskDefinition::new(
            "quality_assurance",
            serde_json::json!({
                "destination": "Tokyo",
                "themes": themes,
                "validated_share": 0.7,
                "discovery_quality": 0.8,
                "seasons_covered": 4,
            }),
        );
        let response = agent.execute_task("task-1", &task).await;
        assert_eq!(response.status, TaskStatus::Success);

        let result: QualityAssuranceResult =
            serde_json::from_value(response.data.unwrap()).unwrap();
        assert!((result.overall_score - 1.0).abs() < 1e-9);
        assert_eq!(result.quality_metrics["decision"], "approve");
        assert!(result.interventions.is_empty());
    }

    #[tokio::test]
    async fn test_weak_run_lists_interventions() {
        let agent = QualityAssuranceAgent::new();
        let task = TaskDefinition::new(
            "quality_assurance",
            serde_json::json!({
                "destination": "Tokyo",
                "themes": themed("hotel", 2),
                "validated_share": 0.0,
                "discovery_quality": 0.2,
                "seasons_covered": 0,
            }),
        );
        let response = agent.execute_task("task-2", &task).await;
        let result: QualityAssuranceResult =
            serde_json::from_value(response.data.unwrap()).unwrap();
        assert_eq!(result.quality_metrics["decision"], "escalate");
        assert!(!result.interventions.is_empty());
        assert!(!result.recommendations.is_empty());
    }
}
