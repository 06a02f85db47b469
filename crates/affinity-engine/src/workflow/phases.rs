//! Workflow phase identities and scoring weights

use serde::{Deserialize, Serialize};

/// Ordered phases of the destination pipeline. The two enhancement-branch
/// phases both run inside `ParallelEnhancement` but carry their own score
/// keys so the weighted final score can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Initialization,
    WebDiscovery,
    LlmProcessing,
    ParallelEnhancement,
    SeasonalImageGeneration,
    QualityAssurance,
    Done,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Initialization => "initialization",
            WorkflowPhase::WebDiscovery => "web_discovery",
            WorkflowPhase::LlmProcessing => "llm_processing",
            WorkflowPhase::ParallelEnhancement => "parallel_enhancement",
            WorkflowPhase::SeasonalImageGeneration => "seasonal_image_generation",
            WorkflowPhase::QualityAssurance => "quality_assurance",
            WorkflowPhase::Done => "done",
        }
    }

    pub fn next(&self) -> Option<WorkflowPhase> {
        match self {
            WorkflowPhase::Initialization => Some(WorkflowPhase::WebDiscovery),
            WorkflowPhase::WebDiscovery => Some(WorkflowPhase::LlmProcessing),
            WorkflowPhase::LlmProcessing => Some(WorkflowPhase::ParallelEnhancement),
            WorkflowPhase::ParallelEnhancement => Some(WorkflowPhase::SeasonalImageGeneration),
            WorkflowPhase::SeasonalImageGeneration => Some(WorkflowPhase::QualityAssurance),
            WorkflowPhase::QualityAssurance => Some(WorkflowPhase::Done),
            WorkflowPhase::Done => None,
        }
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score keys and weights for the final quality roll-up. The enhancement
/// branches are weighted separately from their shared scheduling phase.
pub const PHASE_WEIGHTS: [(&str, f64); 6] = [
    ("web_discovery", 0.18),
    ("llm_processing", 0.28),
    ("intelligence_enhancement", 0.22),
    ("evidence_validation", 0.14),
    ("seasonal_image_generation", 0.08),
    ("quality_assurance", 0.10),
];

/// Weighted mean over whichever phases actually produced a score, with the
/// weights renormalized to the present subset. A run where image generation
/// never happened is judged on the phases that did run, not penalized for
/// a missing denominator term.
pub fn weighted_quality(scores: &std::collections::HashMap<String, f64>) -> f64 {
    let mut weight_sum = 0.0;
    let mut total = 0.0;
    for (key, weight) in PHASE_WEIGHTS {
        if let Some(score) = scores.get(key) {
            weight_sum += weight;
            total += weight * score;
        }
    }
    if weight_sum == 0.0 {
        0.0
    } else {
        total / weight_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_phase_order_terminates_at_done() {
        let mut phase = WorkflowPhase::Initialization;
        let mut steps = 0;
        while let Some(next) = phase.next() {
            phase = next;
            steps += 1;
        }
        assert_eq!(phase, WorkflowPhase::Done);
        assert_eq!(steps, 6);
    }

    #[test]
    fn test_weighted_quality_all_phases() {
        let scores: HashMap<String, f64> = PHASE_WEIGHTS
            .iter()
            .map(|(k, _)| (k.to_string(), 0.5))
            .collect();
        assert!((weighted_quality(&scores) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_quality_renormalizes_over_present_phases() {
        let mut scores = HashMap::new();
        scores.insert("web_discovery".to_string(), 1.0);
        scores.insert("llm_processing".to_string(), 0.0);
        // weights 0.18 and 0.28 renormalize to 0.18/0.46
        let expected = 0.18 / 0.46;
        assert!((weighted_quality(&scores) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_quality_empty_is_zero() {
        assert_eq!(weighted_quality(&HashMap::new()), 0.0);
    }
}
