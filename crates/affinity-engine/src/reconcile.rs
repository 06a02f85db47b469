//! Validation/reconciliation engine
//!
//! Merges LLM-baseline themes with evidence outcomes: adjusts confidence by
//! evidence strength and source authority, admits themes through a union of
//! quality gates, then collapses near-duplicate themes keeping the
//! highest-confidence representative.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::embeddings::{cosine_similarity, TextEmbedder};
use crate::models::{ThemeData, ThemeEvidence, ValidationStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub validated_boost: f64,
    pub partial_boost: f64,
    pub unvalidated_penalty: f64,
    pub authority_adjustment: f64,
    pub high_authority_threshold: f64,
    pub low_authority_threshold: f64,
    pub high_confidence_gate: f64,
    pub partial_gate_min_confidence: f64,
    pub dedup_similarity_threshold: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            validated_boost: 0.2,
            partial_boost: 0.1,
            unvalidated_penalty: 0.15,
            authority_adjustment: 0.05,
            high_authority_threshold: 0.7,
            low_authority_threshold: 0.4,
            high_confidence_gate: 0.85,
            partial_gate_min_confidence: 0.6,
            dedup_similarity_threshold: 0.8,
        }
    }
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub input_count: usize,
    pub gated_out: usize,
    pub deduplicated: usize,
    pub output_count: usize,
}

/// Reconciles themes against their evidence
pub struct ReconcileEngine {
    config: ReconcileConfig,
    embedder: Option<Arc<dyn TextEmbedder>>,
}

impl ReconcileEngine {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Full pass: adjust confidence, gate, deduplicate. Evidence is looked
    /// up by lowercased theme name; themes with no evidence record are
    /// treated as unvalidated.
    pub async fn validate_and_reconcile(
        &self,
        themes: Vec<ThemeData>,
        evidence: &HashMap<String, ThemeEvidence>,
    ) -> (Vec<ThemeData>, ReconcileSummary) {
        let input_count = themes.len();

        let adjusted: Vec<ThemeData> = themes
            .into_iter()
            .map(|theme| {
                let record = evidence.get(&theme.theme.trim().to_lowercase());
                self.adjust_confidence(theme, record)
            })
            .collect();

        let gated: Vec<ThemeData> = adjusted
            .into_iter()
            .filter(|theme| {
                let record = evidence.get(&theme.theme.trim().to_lowercase());
                let pass = self.passes_quality_gates(theme, record);
                if !pass {
                    tracing::debug!("[RECONCILE] theme '{}' gated out", theme.theme);
                }
                pass
            })
            .collect();
        let gated_out = input_count - gated.len();

        let before_dedup = gated.len();
        let output = self.deduplicate(gated).await;
        let deduplicated = before_dedup - output.len();

        let summary = ReconcileSummary {
            input_count,
            gated_out,
            deduplicated,
            output_count: output.len(),
        };
        tracing::info!(
            "[RECONCILE] {} theme(s) in, {} gated out, {} deduplicated, {} out",
            summary.input_count,
            summary.gated_out,
            summary.deduplicated,
            summary.output_count
        );
        (output, summary)
    }

    /// Evidence-driven confidence adjustment. Re-running the pass replaces
    /// the previous adjustment: the base is always the original confidence,
    /// never a previously adjusted value.
    pub fn adjust_confidence(
        &self,
        mut theme: ThemeData,
        evidence: Option<&ThemeEvidence>,
    ) -> ThemeData {
        let original = theme.original_confidence.unwrap_or(theme.confidence);
        let mut adjusted = original;

        match evidence.map(|e| e.validation_status) {
            Some(ValidationStatus::Validated) => adjusted += self.config.validated_boost,
            Some(ValidationStatus::PartiallyValidated) => adjusted += self.config.partial_boost,
            Some(ValidationStatus::Conflicting) | Some(ValidationStatus::Pending) => {}
            Some(ValidationStatus::Unvalidated) | None => {
                adjusted -= self.config.unvalidated_penalty
            }
        }

        if let Some(record) = evidence {
            if record.average_authority >= self.config.high_authority_threshold {
                adjusted += self.config.authority_adjustment;
            } else if record.average_authority < self.config.low_authority_threshold
                && record.total_evidence_count > 0
            {
                adjusted -= self.config.authority_adjustment;
            }
            theme.evidence_summary = Some(serde_json::json!({
                "validation_status": record.validation_status,
                "evidence_count": record.total_evidence_count,
                "unique_sources": record.unique_source_count,
                "average_authority": record.average_authority,
                "validation_confidence": record.validation_confidence,
            }));
        } else {
            theme.evidence_summary = Some(serde_json::json!({
                "validation_status": ValidationStatus::Unvalidated,
                "evidence_count": 0,
            }));
        }

        theme.original_confidence = Some(original);
        theme.confidence = adjusted.clamp(0.0, 1.0);
        theme
    }

    /// Union of three admission criteria; passing any one is sufficient:
    /// full evidence, exceptional original confidence, or partial evidence
    /// with a solid adjusted score.
    pub fn passes_quality_gates(
        &self,
        theme: &ThemeData,
        evidence: Option<&ThemeEvidence>,
    ) -> bool {
        let full_evidence = evidence.is_some_and(|e| {
            e.meets_minimum_evidence && e.meets_source_diversity && e.meets_quality_threshold
        });
        if full_evidence {
            return true;
        }

        let original = theme.original_confidence.unwrap_or(theme.confidence);
        if original >= self.config.high_confidence_gate {
            return true;
        }

        evidence.is_some_and(|e| {
            e.validation_status == ValidationStatus::PartiallyValidated
                && theme.confidence >= self.config.partial_gate_min_confidence
        })
    }

    /// Semantic dedup of theme names: greedy single-seed grouping at the
    /// similarity threshold, keeping the highest-adjusted-confidence member
    /// of each group. Without an embedder only exact-normalized names merge.
    async fn deduplicate(&self, themes: Vec<ThemeData>) -> Vec<ThemeData> {
        if themes.len() < 2 {
            return themes;
        }

        let names: Vec<String> = themes
            .iter()
            .map(|t| t.theme.trim().to_lowercase())
            .collect();

        let vectors = match &self.embedder {
            Some(embedder) => match embedder.embed_batch(&names).await {
                Ok(v) if v.len() == themes.len() => Some(v),
                Ok(_) | Err(_) => {
                    tracing::warn!("[RECONCILE] embedding failed, dedup by exact name only");
                    None
                }
            },
            None => None,
        };

        let mut grouped = vec![false; themes.len()];
        let mut keep = Vec::new();
        for seed in 0..themes.len() {
            if grouped[seed] {
                continue;
            }
            grouped[seed] = true;
            let mut group = vec![seed];
            for other in (seed + 1)..themes.len() {
                if grouped[other] {
                    continue;
                }
                let similar = match &vectors {
                    Some(v) => {
                        cosine_similarity(&v[seed], &v[other])
                            >= self.config.dedup_similarity_threshold
                    }
                    None => names[seed] == names[other],
                };
                if similar {
                    grouped[other] = true;
                    group.push(other);
                }
            }
            let best = group
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    themes[a]
                        .confidence
                        .partial_cmp(&themes[b].confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(seed);
            keep.push(best);
        }

        keep.sort_unstable();
        let mut keep_flags = vec![false; themes.len()];
        for idx in keep {
            keep_flags[idx] = true;
        }
        themes
            .into_iter()
            .zip(keep_flags)
            .filter_map(|(theme, keep)| keep.then_some(theme))
            .collect()
    }
}
