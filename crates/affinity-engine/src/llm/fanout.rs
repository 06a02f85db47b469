//! Multi-provider LLM fan-out
//!
//! Issues the same nuance-generation prompt to every registered model for
//! every category, with bounded concurrency and per-call timeouts. One
//! model/category failing never aborts the others; failures are recorded
//! alongside the successful responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::cache::{CacheKey, CachedResponse, LlmCache};
use crate::models::NuanceCategory;
use crate::retry::RetryPolicy;

use super::provider::{ChatConfig, ChatMessage, ChatRequest, ProviderError};
use super::registry::{ClientRegistry, ModelHandle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    pub concurrency: usize,
    pub per_call_timeout_secs: u64,
    pub outer_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            per_call_timeout_secs: 20,
            outer_timeout_secs: 30,
            temperature: 0.8,
            max_tokens: 512,
        }
    }
}

/// One failed (model, category) pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub model_id: String,
    pub category: NuanceCategory,
    pub error: String,
}

/// All raw phrases from the fan-out, keyed model -> category -> phrases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanoutResult {
    pub responses: HashMap<String, HashMap<NuanceCategory, Vec<String>>>,
    pub failures: Vec<GenerationFailure>,
}

impl FanoutResult {
    pub fn models_succeeded(&self) -> usize {
        self.responses.len()
    }

    /// Phrases per category across all models, model identity preserved
    pub fn by_category(&self, category: NuanceCategory) -> HashMap<String, Vec<String>> {
        self.responses
            .iter()
            .filter_map(|(model, cats)| {
                cats.get(&category)
                    .filter(|phrases| !phrases.is_empty())
                    .map(|phrases| (model.clone(), phrases.clone()))
            })
            .collect()
    }
}

static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]+|\d+[.)])\s*").unwrap());
static GENERIC_PHRASE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^(?:very|really|quite|extremely|truly)\b").unwrap(),
        Regex::new(r"^(?:good|great|nice|best|top)\b").unwrap(),
        Regex::new(r"\b(?:experience|experiences)$").unwrap(),
    ]
});

const GENERIC_NOUNS: &[&str] = &[
    "hotel",
    "service",
    "facility",
    "accommodation",
    "amenity",
    "feature",
];

const DENY_LIST: &[&str] = &[
    "wifi",
    "free wifi",
    "parking",
    "air conditioning",
    "room service",
    "swimming pool",
    "breakfast included",
    "friendly staff",
    "clean rooms",
];

/// Strip bullets, numbering, and surrounding quotes from line-oriented
/// LLM output and return the candidate phrases.
pub fn parse_phrases(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let stripped = BULLET_PREFIX.replace(line, "");
            stripped
                .trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Quality filter for candidate phrases: 2-5 words, 5-30 chars, not on the
/// deny list, not matching a generic-phrase pattern, no overly generic noun.
pub fn passes_quality_filter(phrase: &str) -> bool {
    let lower = phrase.to_lowercase();
    let word_count = lower.split_whitespace().count();
    let char_count = lower.chars().count();

    if !(2..=5).contains(&word_count) || !(5..=30).contains(&char_count) {
        return false;
    }
    if DENY_LIST.contains(&lower.as_str()) {
        return false;
    }
    if GENERIC_PHRASE_RES.iter().any(|re| re.is_match(&lower)) {
        return false;
    }
    if lower
        .split_whitespace()
        .any(|w| GENERIC_NOUNS.contains(&w))
    {
        return false;
    }
    true
}

fn build_prompt(destination: &str, category: NuanceCategory) -> (String, String) {
    let system = "You are a travel intelligence analyst. Respond with one short phrase per \
                  line, no numbering, no commentary. Each phrase must be 2-5 words and name \
                  something specific to the destination, never a generic amenity."
        .to_string();
    let user = match category {
        NuanceCategory::Destination => format!(
            "List 10 distinctive experiences, scenes, or local habits a traveler would \
             uniquely associate with {}.",
            destination
        ),
        NuanceCategory::Hotel => format!(
            "List 8 distinctive qualities travelers expect from hotels in {}, specific to \
             this destination's style and setting.",
            destination
        ),
        NuanceCategory::VacationRental => format!(
            "List 8 distinctive qualities travelers expect from vacation rentals in {}, \
             specific to this destination's neighborhoods and way of living.",
            destination
        ),
    };
    (system, user)
}

/// Fans one prompt out across models × categories
pub struct LlmFanout {
    config: FanoutConfig,
    retry: RetryPolicy,
    cache: Option<Arc<LlmCache>>,
}

impl LlmFanout {
    pub fn new(config: FanoutConfig, retry: RetryPolicy) -> Self {
        Self {
            config,
            retry,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<LlmCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run the full models × categories cross-product. Results are
    /// collected positionally, so output grouping is deterministic even
    /// though completion order is not.
    pub async fn generate_all(
        &self,
        registry: &ClientRegistry,
        destination: &str,
    ) -> FanoutResult {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = Vec::new();

        for handle in registry.models() {
            for &category in NuanceCategory::ALL.iter() {
                let semaphore = Arc::clone(&semaphore);
                let handle = handle.clone();
                let destination = destination.to_string();
                tasks.push(async move {
                    // Closed only if the semaphore is dropped, which cannot
                    // happen while this future holds a clone
                    let _permit = semaphore.acquire().await.expect("semaphore closed");
                    let outcome = self.generate_one(&handle, &destination, category).await;
                    (handle.model_id.clone(), category, outcome)
                });
            }
        }

        let results = futures::future::join_all(tasks).await;

        let mut fanout = FanoutResult::default();
        for (model_id, category, outcome) in results {
            match outcome {
                Ok(phrases) => {
                    tracing::info!(
                        "[FANOUT] {} / {}: {} phrase(s) passed the filter",
                        model_id,
                        category,
                        phrases.len()
                    );
                    fanout
                        .responses
                        .entry(model_id)
                        .or_default()
                        .insert(category, phrases);
                }
                Err(err) => {
                    tracing::warn!("[FANOUT] {} / {} failed: {}", model_id, category, err);
                    fanout.failures.push(GenerationFailure {
                        model_id,
                        category,
                        error: err.to_string(),
                    });
                }
            }
        }
        fanout
    }

    /// One (model, category) generation with cache, retry, and timeouts
    pub async fn generate_one(
        &self,
        handle: &ModelHandle,
        destination: &str,
        category: NuanceCategory,
    ) -> Result<Vec<String>, ProviderError> {
        let (system, user) = build_prompt(destination, category);
        let cache_key = CacheKey::new(
            &format!("{}|{}|{}", handle.model_id, category, user),
            "nuance_generation",
        );

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                return Ok(Self::filter_phrases(&cached.content));
            }
        }

        let request = ChatRequest {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            config: ChatConfig {
                model: handle.model_id.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            },
        };

        let per_call = Duration::from_secs(self.config.per_call_timeout_secs);
        let outer = Duration::from_secs(self.config.outer_timeout_secs);

        let label = format!("llm {}", handle.model_id);
        let attempt = self.retry.run(&label, || {
            let request = request.clone();
            let provider = Arc::clone(&handle.provider);
            async move {
                match tokio::time::timeout(per_call, provider.chat(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(per_call.as_secs())),
                }
            }
        });

        let response = match tokio::time::timeout(outer, attempt).await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(outer.as_secs())),
        };

        if let Some(cache) = &self.cache {
            cache
                .put(
                    cache_key,
                    CachedResponse {
                        content: response.content.clone(),
                        cached_at: chrono::Utc::now(),
                        provider: handle.provider.name().to_string(),
                        model: handle.model_id.clone(),
                    },
                )
                .await;
        }

        Ok(Self::filter_phrases(&response.content))
    }

    fn filter_phrases(text: &str) -> Vec<String> {
        parse_phrases(text)
            .into_iter()
            .filter(|p| passes_quality_filter(p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LlmProvider;
    use crate::llm::registry::test_support::ScriptedProvider;
    use crate::llm::registry::RegistryConfig;

    #[test]
    fn test_parse_phrases_strips_bullets_numbers_quotes() {
        let text = "- golden gai bar hopping\n2) \"depachika food halls\"\n• 'tsukiji outer market'\n\n";
        let phrases = parse_phrases(text);
        assert_eq!(
            phrases,
            vec![
                "golden gai bar hopping",
                "depachika food halls",
                "tsukiji outer market"
            ]
        );
    }

    #[test]
    fn test_quality_filter_bounds() {
        // All accepted phrases are 2-5 words and 5-30 chars
        assert!(passes_quality_filter("golden gai bar hopping"));
        assert!(!passes_quality_filter("tokyo"));
        assert!(!passes_quality_filter(
            "an extremely long phrase that rambles far beyond the limit"
        ));
        assert!(!passes_quality_filter("a b"));
    }

    #[test]
    fn test_quality_filter_rejects_generic_content() {
        assert!(!passes_quality_filter("free wifi"));
        assert!(!passes_quality_filter("great hotel pools"));
        assert!(!passes_quality_filter("luxury hotel towers"));
        assert!(!passes_quality_filter("amenity rich stays"));
        assert!(passes_quality_filter("ryokan tatami rooms"));
    }

    #[tokio::test]
    async fn test_fanout_isolates_failures_per_model() {
        let ok_provider = Arc::new(ScriptedProvider::new(vec![(
            "model-a",
            Ok("golden gai bar hopping\nshibuya crossing crowds"),
        )]));
        let failing_provider = Arc::new(ScriptedProvider::new(vec![(
            "model-b",
            Err("connection reset"),
        )]));

        let registry = ClientRegistry::new(
            vec![
                (
                    ok_provider as Arc<dyn LlmProvider>,
                    vec!["model-a".to_string()],
                ),
                (
                    failing_provider as Arc<dyn LlmProvider>,
                    vec!["model-b".to_string()],
                ),
            ],
            &RegistryConfig {
                min_working_models: 2,
            },
        )
        .unwrap();

        let fanout = LlmFanout::new(FanoutConfig::default(), RetryPolicy::none());
        let result = fanout.generate_all(&registry, "Tokyo").await;

        assert_eq!(result.models_succeeded(), 1);
        // model-b fails for all three categories, model-a succeeds for all
        assert_eq!(result.failures.len(), 3);
        assert!(result.failures.iter().all(|f| f.model_id == "model-b"));

        let destination = result.by_category(NuanceCategory::Destination);
        assert_eq!(destination["model-a"].len(), 2);
    }
}
