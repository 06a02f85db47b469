//! Semantic consensus engine
//!
//! Reconciles nuance phrases produced independently by several models.
//! Near-duplicate phrases are grouped by embedding cosine similarity, and a
//! group endorsed by at least two distinct models is promoted to consensus.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::embeddings::{cosine_similarity, TextEmbedder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub similarity_threshold: f64,
    pub min_models_for_consensus: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            min_models_for_consensus: 2,
        }
    }
}

/// Consensus phrases plus the full deduplicated pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub consensus: Vec<String>,
    pub unique: Vec<String>,
}

fn normalize(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

/// Builds consensus across model responses for one category
pub struct ConsensusEngine {
    config: ConsensusConfig,
    embedder: Option<Arc<dyn TextEmbedder>>,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Build consensus from per-model phrase lists. Zero models (or zero
    /// phrases) yields empty results, never an error; a model shortfall is
    /// the caller's availability concern, consensus proceeds with whatever
    /// arrived.
    pub async fn build_consensus(
        &self,
        model_responses: &HashMap<String, Vec<String>>,
    ) -> ConsensusResult {
        // Exact-dedup pool, first-seen casing kept, model attribution per
        // normalized phrase
        let mut unique: Vec<String> = Vec::new();
        let mut models_for: HashMap<String, HashSet<String>> = HashMap::new();
        for (model, phrases) in model_responses {
            for phrase in phrases {
                let key = normalize(phrase);
                if key.is_empty() {
                    continue;
                }
                if !models_for.contains_key(&key) {
                    unique.push(phrase.trim().to_string());
                }
                models_for.entry(key).or_default().insert(model.clone());
            }
        }

        if unique.is_empty() {
            return ConsensusResult::default();
        }

        let groups = self.group_phrases(&unique).await;

        let mut consensus = Vec::new();
        for group in &groups {
            let mut endorsing: HashSet<&String> = HashSet::new();
            for &idx in group {
                if let Some(models) = models_for.get(&normalize(&unique[idx])) {
                    endorsing.extend(models.iter());
                }
            }
            if endorsing.len() >= self.config.min_models_for_consensus {
                let representative = self.representative(&unique, group).await;
                consensus.push(representative);
            }
        }

        tracing::info!(
            "[CONSENSUS] {} unique phrase(s), {} group(s), {} promoted",
            unique.len(),
            groups.len(),
            consensus.len()
        );

        ConsensusResult { consensus, unique }
    }

    /// Greedy single-seed grouping: each ungrouped phrase seeds a group and
    /// absorbs every other ungrouped phrase within the similarity
    /// threshold of the seed. This is deliberately not transitive-closure
    /// clustering; members similar to the seed but not to each other still
    /// share a group, and chains beyond the seed are not followed.
    async fn group_phrases(&self, unique: &[String]) -> Vec<Vec<usize>> {
        let vectors = match &self.embedder {
            Some(embedder) => {
                let texts: Vec<String> = unique.iter().map(|p| normalize(p)).collect();
                match embedder.embed_batch(&texts).await {
                    Ok(v) if v.len() == unique.len() => Some(v),
                    Ok(_) | Err(_) => {
                        tracing::warn!(
                            "[CONSENSUS] embedding failed, falling back to exact matching"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let mut grouped = vec![false; unique.len()];
        let mut groups = Vec::new();
        for seed in 0..unique.len() {
            if grouped[seed] {
                continue;
            }
            grouped[seed] = true;
            let mut group = vec![seed];
            for other in (seed + 1)..unique.len() {
                if grouped[other] {
                    continue;
                }
                let similar = match &vectors {
                    Some(v) => {
                        cosine_similarity(&v[seed], &v[other])
                            >= self.config.similarity_threshold
                    }
                    // No embedder: only exact-normalized matches group, and
                    // those were already merged during dedup
                    None => false,
                };
                if similar {
                    grouped[other] = true;
                    group.push(other);
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Representative = member with the highest mean similarity to the rest
    /// of its group (centrality). Singleton groups represent themselves.
    async fn representative(&self, unique: &[String], group: &[usize]) -> String {
        if group.len() == 1 {
            return unique[group[0]].clone();
        }
        let Some(embedder) = &self.embedder else {
            return unique[group[0]].clone();
        };

        let texts: Vec<String> = group.iter().map(|&i| normalize(&unique[i])).collect();
        let Ok(vectors) = embedder.embed_batch(&texts).await else {
            return unique[group[0]].clone();
        };
        if vectors.len() != group.len() {
            return unique[group[0]].clone();
        }

        let mut best = 0usize;
        let mut best_score = f64::MIN;
        for i in 0..group.len() {
            let mut total = 0.0;
            for j in 0..group.len() {
                if i != j {
                    total += cosine_similarity(&vectors[i], &vectors[j]);
                }
            }
            let mean = total / (group.len() - 1) as f64;
            if mean > best_score {
                best_score = mean;
                best = i;
            }
        }
        unique[group[best]].clone()
    }
}
