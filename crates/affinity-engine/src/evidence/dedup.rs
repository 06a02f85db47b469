//! Cross-session evidence deduplication registry
//!
//! Contractual dedup boundary keyed by phrase + destination. The current
//! strategy registers everything and reports no duplicates; the similarity
//! threshold is carried in the config so a semantic strategy can slot in
//! without changing callers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::EvidencePiece;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

/// Outcome of checking a batch of evidence against the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupOutcome {
    pub accepted: Vec<EvidencePiece>,
    pub duplicate_count: usize,
}

fn registry_key(phrase: &str, destination: &str) -> String {
    format!(
        "{}::{}",
        destination.trim().to_lowercase(),
        phrase.trim().to_lowercase()
    )
}

/// Registry of evidence already attributed to a phrase+destination pair
#[derive(Debug, Default)]
pub struct EvidenceDedupRegistry {
    config: DedupConfig,
    seen: HashMap<String, Vec<String>>,
}

impl EvidenceDedupRegistry {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            seen: HashMap::new(),
        }
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.config.similarity_threshold
    }

    /// Register evidence for a phrase and return the non-duplicate subset.
    /// Pass-through strategy: every piece is accepted and recorded.
    pub fn register(
        &mut self,
        phrase: &str,
        destination: &str,
        pieces: Vec<EvidencePiece>,
    ) -> DedupOutcome {
        let key = registry_key(phrase, destination);
        let urls = self.seen.entry(key).or_default();
        for piece in &pieces {
            urls.push(piece.source_url.clone());
        }
        tracing::debug!(
            "[DEDUP] registered {} pieces for '{}' / '{}'",
            pieces.len(),
            phrase,
            destination
        );
        DedupOutcome {
            accepted: pieces,
            duplicate_count: 0,
        }
    }

    /// Number of phrase+destination pairs with registered evidence
    pub fn tracked_pairs(&self) -> usize {
        self.seen.len()
    }

    /// URLs previously registered for a phrase+destination pair
    pub fn known_urls(&self, phrase: &str, destination: &str) -> &[String] {
        self.seen
            .get(&registry_key(phrase, destination))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
