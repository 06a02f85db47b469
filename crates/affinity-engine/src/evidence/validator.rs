//! Evidence extraction and validation
//!
//! Pulls supporting sentences for a theme out of fetched web pages, scores
//! each source's authority from domain heuristics, rates evidence quality,
//! and rolls everything up into a per-theme validation status.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::embeddings::{cosine_similarity, TextEmbedder};
use crate::models::{
    EvidencePiece, EvidenceValidationReport, QualityRating, SourceType, ThemeEvidence,
    ValidationStatus, WebContent,
};

/// Thresholds and caps for evidence collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceConfig {
    pub max_evidence_pieces: usize,
    pub max_pieces_per_source: usize,
    pub min_evidence_pieces: usize,
    pub min_unique_sources: usize,
    pub min_authority_score: f64,
    pub min_relevance_score: f64,
    pub min_content_length: usize,
    pub require_destination_mention: bool,
    pub semantic_similarity_threshold: f64,
    pub use_semantic_filter: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_evidence_pieces: 10,
            max_pieces_per_source: 3,
            min_evidence_pieces: 3,
            min_unique_sources: 2,
            min_authority_score: 0.3,
            min_relevance_score: 0.5,
            min_content_length: 50,
            require_destination_mention: true,
            semantic_similarity_threshold: 0.7,
            use_semantic_filter: false,
        }
    }
}

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

static GOVERNMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.gov(\.|/|$)|government").unwrap());
static EDUCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.edu(\.|/|$)|university|college").unwrap());
static MAJOR_TRAVEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"lonelyplanet|tripadvisor|fodors|frommers|expedia|booking\.com|kayak|airbnb")
        .unwrap()
});
static TOURISM_BOARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"visit[a-z]+\.|tourism|touristboard|official.*travel").unwrap());
static NEWS_MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"cnn|bbc|nytimes|theguardian|reuters|washingtonpost|aljazeera|news").unwrap()
});
static TRAVEL_BLOG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"blog|wordpress|medium\.com|substack").unwrap());
static SOCIAL_MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"facebook|instagram|twitter|x\.com|reddit|tiktok|youtube|pinterest").unwrap()
});
static LOCAL_BUSINESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"yelp|foursquare|opentable|localguide").unwrap());

static KNOWN_AUTHORITATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"wikipedia|britannica|smithsonian|nationalgeographic|national-geographic").unwrap()
});
static SUSPICIOUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"free|cheap|discount|deal|affiliate").unwrap());

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "has", "have", "its",
];

/// Classify a source by URL and title
pub fn classify_source(url: &str, title: &str) -> SourceType {
    let haystack = format!("{} {}", url, title).to_lowercase();
    if GOVERNMENT_RE.is_match(&haystack) {
        SourceType::Government
    } else if EDUCATION_RE.is_match(&haystack) {
        SourceType::Education
    } else if MAJOR_TRAVEL_RE.is_match(&haystack) {
        SourceType::MajorTravel
    } else if TOURISM_BOARD_RE.is_match(&haystack) {
        SourceType::TourismBoard
    } else if NEWS_MEDIA_RE.is_match(&haystack) {
        SourceType::NewsMedia
    } else if SOCIAL_MEDIA_RE.is_match(&haystack) {
        SourceType::SocialMedia
    } else if TRAVEL_BLOG_RE.is_match(&haystack) {
        SourceType::TravelBlog
    } else if LOCAL_BUSINESS_RE.is_match(&haystack) {
        SourceType::LocalBusiness
    } else {
        SourceType::Unknown
    }
}

/// Authority score: category base weight plus small URL adjustments
pub fn score_authority(url: &str, source_type: SourceType) -> f64 {
    let lower = url.to_lowercase();
    let mut score = source_type.base_authority();
    if lower.starts_with("https://") {
        score += 0.05;
    }
    if KNOWN_AUTHORITATIVE_RE.is_match(&lower) {
        score += 0.1;
    }
    if SUSPICIOUS_RE.is_match(&lower) {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// Quality tier from authority and evidence length
pub fn rate_quality(authority: f64, text_len: usize) -> QualityRating {
    if authority >= 0.8 && text_len >= 200 {
        QualityRating::Excellent
    } else if authority >= 0.6 && text_len >= 100 {
        QualityRating::Good
    } else if authority >= 0.4 && text_len >= 50 {
        QualityRating::Acceptable
    } else if authority >= 0.2 {
        QualityRating::Poor
    } else {
        QualityRating::Rejected
    }
}

fn domain_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_lowercase()
}

fn theme_keywords(theme: &str) -> Vec<String> {
    theme
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Extracts and validates evidence for themes against fetched pages
pub struct EvidenceValidator {
    config: EvidenceConfig,
    embedder: Option<Arc<dyn TextEmbedder>>,
}

impl EvidenceValidator {
    pub fn new(config: EvidenceConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Enable the optional semantic-similarity gate
    pub fn with_embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &EvidenceConfig {
        &self.config
    }

    /// Collect and validate evidence for one theme across the given pages.
    /// Pages with no extractable sentences contribute nothing; total absence
    /// of evidence yields UNVALIDATED rather than an error.
    pub async fn validate_theme_evidence(
        &self,
        theme: &str,
        _category: &str,
        pages: &[WebContent],
        destination: &str,
    ) -> ThemeEvidence {
        let keywords = theme_keywords(theme);
        let dest_lower = destination.to_lowercase();

        let mut candidates: Vec<EvidencePiece> = Vec::new();
        for page in pages {
            candidates.extend(self.extract_from_page(theme, &keywords, &dest_lower, page));
        }

        if self.config.use_semantic_filter {
            candidates = self.apply_semantic_filter(theme, candidates).await;
        }

        // Cap per source so one domain cannot dominate the evidence set
        let mut per_source: HashMap<String, usize> = HashMap::new();
        candidates.sort_by(|a, b| {
            (b.authority_score, b.relevance_score)
                .partial_cmp(&(a.authority_score, a.relevance_score))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut pieces: Vec<EvidencePiece> = Vec::new();
        for piece in candidates {
            let count = per_source.entry(domain_of(&piece.source_url)).or_insert(0);
            if *count < self.config.max_pieces_per_source {
                *count += 1;
                pieces.push(piece);
            }
            if pieces.len() >= self.config.max_evidence_pieces {
                break;
            }
        }

        self.assemble(theme, destination, pieces)
    }

    /// Validate several themes and roll them up into a destination report
    pub async fn build_report(
        &self,
        themes: &[(String, String)],
        pages: &[WebContent],
        destination: &str,
    ) -> EvidenceValidationReport {
        let mut theme_evidence = Vec::with_capacity(themes.len());
        for (theme, category) in themes {
            theme_evidence.push(
                self.validate_theme_evidence(theme, category, pages, destination)
                    .await,
            );
        }

        let validated_count = theme_evidence
            .iter()
            .filter(|e| e.validation_status == ValidationStatus::Validated)
            .count();
        let partially_validated_count = theme_evidence
            .iter()
            .filter(|e| e.validation_status == ValidationStatus::PartiallyValidated)
            .count();
        let unvalidated_count = theme_evidence
            .iter()
            .filter(|e| e.validation_status == ValidationStatus::Unvalidated)
            .count();
        let overall_confidence = if theme_evidence.is_empty() {
            0.0
        } else {
            theme_evidence
                .iter()
                .map(|e| e.validation_confidence)
                .sum::<f64>()
                / theme_evidence.len() as f64
        };
        let evidence_gaps = theme_evidence
            .iter()
            .flat_map(|e| {
                e.evidence_gaps
                    .iter()
                    .map(move |g| format!("{}: {}", e.theme, g))
            })
            .collect();

        tracing::info!(
            "[EVIDENCE] {}: {} themes validated ({} full, {} partial, {} unvalidated)",
            destination,
            theme_evidence.len(),
            validated_count,
            partially_validated_count,
            unvalidated_count
        );

        EvidenceValidationReport {
            destination: destination.to_string(),
            themes_validated: theme_evidence.len(),
            validated_count,
            partially_validated_count,
            unvalidated_count,
            overall_confidence,
            evidence_gaps,
            theme_evidence,
        }
    }

    fn extract_from_page(
        &self,
        theme: &str,
        keywords: &[String],
        dest_lower: &str,
        page: &WebContent,
    ) -> Vec<EvidencePiece> {
        let source_type = classify_source(&page.url, &page.title);
        let authority = score_authority(&page.url, source_type);
        if authority < self.config.min_authority_score {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        for sentence in SENTENCE_SPLIT.split(&page.content) {
            let sentence = sentence.trim();
            if sentence.len() < self.config.min_content_length {
                continue;
            }
            let lower = sentence.to_lowercase();

            let mentions_destination = lower.contains(dest_lower);
            if self.config.require_destination_mention && !mentions_destination {
                continue;
            }

            let matched: Vec<String> = keywords
                .iter()
                .filter(|k| lower.contains(k.as_str()))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }

            let relevance = self.relevance_score(&lower, keywords, dest_lower);
            if relevance < self.config.min_relevance_score {
                continue;
            }

            let quality = rate_quality(authority, sentence.len());
            if quality == QualityRating::Rejected {
                continue;
            }

            pieces.push(EvidencePiece::new(
                sentence,
                &page.url,
                &page.title,
                source_type,
                authority,
                quality,
                relevance,
                mentions_destination,
                matched,
            ));
        }

        tracing::debug!(
            "[EVIDENCE] theme '{}': {} candidate pieces from {}",
            theme,
            pieces.len(),
            page.url
        );
        pieces
    }

    /// Keyword-density relevance: theme terms weighted 0.7, destination
    /// mentions 0.3, scaled so a handful of matches in a normal sentence
    /// clears the default threshold.
    fn relevance_score(&self, sentence_lower: &str, keywords: &[String], dest_lower: &str) -> f64 {
        let words: Vec<&str> = sentence_lower.split_whitespace().collect();
        if words.is_empty() {
            return 0.0;
        }
        let total = words.len() as f64;
        let theme_hits = words
            .iter()
            .filter(|w| keywords.iter().any(|k| w.contains(k.as_str())))
            .count() as f64;
        let dest_hits = sentence_lower.matches(dest_lower).count() as f64;
        let density = (theme_hits / total) * 0.7 + (dest_hits / total) * 0.3;
        (density * 10.0).min(1.0)
    }

    async fn apply_semantic_filter(
        &self,
        theme: &str,
        mut candidates: Vec<EvidencePiece>,
    ) -> Vec<EvidencePiece> {
        let Some(embedder) = &self.embedder else {
            tracing::warn!("[EVIDENCE] semantic filter enabled but no embedder configured");
            return candidates;
        };
        if candidates.is_empty() {
            return candidates;
        }

        let mut texts: Vec<String> = vec![theme.to_string()];
        texts.extend(candidates.iter().map(|p| p.text_content.clone()));

        match embedder.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == texts.len() => {
                let theme_vec = &vectors[0];
                for (piece, vec) in candidates.iter_mut().zip(vectors.iter().skip(1)) {
                    piece.semantic_similarity = Some(cosine_similarity(theme_vec, vec));
                }
                let threshold = self.config.semantic_similarity_threshold;
                candidates.retain(|p| p.semantic_similarity.unwrap_or(0.0) >= threshold);
                candidates
            }
            Ok(_) | Err(_) => {
                tracing::warn!(
                    "[EVIDENCE] embedding failed for theme '{}', keeping keyword-filtered evidence",
                    theme
                );
                candidates
            }
        }
    }

    fn assemble(&self, theme: &str, destination: &str, pieces: Vec<EvidencePiece>) -> ThemeEvidence {
        let total = pieces.len();
        let unique_sources: HashSet<String> =
            pieces.iter().map(|p| domain_of(&p.source_url)).collect();
        let unique_source_count = unique_sources.len();
        let strong_count = pieces.iter().filter(|p| p.quality_rating.is_strong()).count();

        let average_authority = if total > 0 {
            pieces.iter().map(|p| p.authority_score).sum::<f64>() / total as f64
        } else {
            0.0
        };
        let average_relevance = if total > 0 {
            pieces.iter().map(|p| p.relevance_score).sum::<f64>() / total as f64
        } else {
            0.0
        };

        let meets_minimum_evidence = total >= self.config.min_evidence_pieces;
        let meets_source_diversity = unique_source_count >= self.config.min_unique_sources;
        let meets_quality_threshold = strong_count >= 2;

        let validation_status =
            if meets_minimum_evidence && meets_source_diversity && meets_quality_threshold {
                ValidationStatus::Validated
            } else if total >= 2 && unique_source_count >= 1 {
                ValidationStatus::PartiallyValidated
            } else {
                ValidationStatus::Unvalidated
            };

        let evidence_ratio =
            (total as f64 / self.config.min_evidence_pieces as f64).min(1.0);
        let source_ratio =
            (unique_source_count as f64 / self.config.min_unique_sources as f64).min(1.0);
        let validation_confidence =
            evidence_ratio * 0.4 + source_ratio * 0.3 + average_authority * 0.3;

        let mut evidence_gaps = Vec::new();
        if !meets_minimum_evidence {
            evidence_gaps.push(format!(
                "insufficient evidence pieces ({}/{})",
                total, self.config.min_evidence_pieces
            ));
        }
        if !meets_source_diversity {
            evidence_gaps.push(format!(
                "insufficient unique sources ({}/{})",
                unique_source_count, self.config.min_unique_sources
            ));
        }
        if !meets_quality_threshold {
            evidence_gaps.push(format!(
                "insufficient good/excellent evidence ({}/2)",
                strong_count
            ));
        }

        ThemeEvidence {
            theme: theme.to_string(),
            destination: destination.to_string(),
            pieces,
            total_evidence_count: total,
            unique_source_count,
            validation_status,
            validation_confidence: validation_confidence.clamp(0.0, 1.0),
            average_authority,
            average_relevance,
            meets_minimum_evidence,
            meets_source_diversity,
            meets_quality_threshold,
            evidence_gaps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, title: &str, content: &str) -> WebContent {
        WebContent::new(url, title, content, 0.5, 0.5, 0.5)
    }

    fn tokyo_sentence(topic: &str) -> String {
        format!(
            "Visitors to Tokyo consistently praise the {} scene found across the city's many neighborhoods and districts. ",
            topic
        )
    }

    #[test]
    fn test_classify_source_categories() {
        assert_eq!(
            classify_source("https://www.japan.gov/tourism", "Official"),
            SourceType::Government
        );
        assert_eq!(
            classify_source("https://travel.university.edu/guide", "Study"),
            SourceType::Education
        );
        assert_eq!(
            classify_source("https://www.lonelyplanet.com/tokyo", "Lonely Planet"),
            SourceType::MajorTravel
        );
        assert_eq!(
            classify_source("https://visittokyo.example/en", "Visit Tokyo"),
            SourceType::TourismBoard
        );
        assert_eq!(
            classify_source("https://www.instagram.com/tokyofood", "Tokyo Food"),
            SourceType::SocialMedia
        );
        assert_eq!(
            classify_source("https://randomsite.example/page", "Page"),
            SourceType::Unknown
        );
    }

    #[test]
    fn test_score_authority_adjustments() {
        // HTTPS bonus on a government source stays clamped at 1.0
        let gov = score_authority("https://www.japan.gov/travel", SourceType::Government);
        assert_eq!(gov, 1.0);

        // Known authoritative domain gets +0.1 on top of its category
        let wiki = score_authority("https://en.wikipedia.org/wiki/Tokyo", SourceType::Unknown);
        assert!((wiki - 0.35).abs() < 1e-9);

        // Suspicious affiliate markers lose 0.1
        let spam = score_authority("http://cheap-tokyo-deals.example", SourceType::TravelBlog);
        assert!((spam - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_rate_quality_tiers() {
        assert_eq!(rate_quality(0.9, 250), QualityRating::Excellent);
        assert_eq!(rate_quality(0.7, 150), QualityRating::Good);
        assert_eq!(rate_quality(0.5, 60), QualityRating::Acceptable);
        assert_eq!(rate_quality(0.25, 30), QualityRating::Poor);
        assert_eq!(rate_quality(0.1, 300), QualityRating::Rejected);
    }

    #[tokio::test]
    async fn test_validated_status_requires_all_three_thresholds() {
        let validator = EvidenceValidator::new(EvidenceConfig::default());
        let body = format!(
            "{}{}{}",
            tokyo_sentence("izakaya nightlife"),
            tokyo_sentence("izakaya dining"),
            tokyo_sentence("izakaya culture")
        );
        let pages = vec![
            page("https://www.japan.gov/nightlife", "Gov Guide", &body),
            page("https://www.lonelyplanet.com/tokyo", "Lonely Planet", &body),
        ];

        let evidence = validator
            .validate_theme_evidence("izakaya nightlife", "destination", &pages, "Tokyo")
            .await;

        assert_eq!(evidence.validation_status, ValidationStatus::Validated);
        assert!(evidence.total_evidence_count >= 3);
        assert!(evidence.unique_source_count >= 2);
        assert!(evidence.meets_quality_threshold);
        assert!(evidence.validation_confidence > 0.0);
        assert!(evidence.evidence_gaps.is_empty());
    }

    #[tokio::test]
    async fn test_no_evidence_is_unvalidated_not_error() {
        let validator = EvidenceValidator::new(EvidenceConfig::default());
        let pages = vec![page(
            "https://example.com/unrelated",
            "Unrelated",
            "Nothing about the topic at all here, just filler text about gardening tips.",
        )];

        let evidence = validator
            .validate_theme_evidence("izakaya nightlife", "destination", &pages, "Tokyo")
            .await;

        assert_eq!(evidence.validation_status, ValidationStatus::Unvalidated);
        assert_eq!(evidence.total_evidence_count, 0);
        assert!(!evidence.evidence_gaps.is_empty());
    }

    #[tokio::test]
    async fn test_per_source_cap_prevents_domination() {
        let config = EvidenceConfig {
            max_pieces_per_source: 2,
            ..Default::default()
        };
        let validator = EvidenceValidator::new(config);
        let body: String = (0..6).map(|_| tokyo_sentence("ramen")).collect();
        let pages = vec![page("https://www.japan.gov/food", "Gov Food", &body)];

        let evidence = validator
            .validate_theme_evidence("ramen culture", "destination", &pages, "Tokyo")
            .await;

        assert!(evidence.total_evidence_count <= 2);
        assert_eq!(evidence.unique_source_count.min(1), evidence.unique_source_count);
    }

    #[tokio::test]
    async fn test_destination_mention_required() {
        let validator = EvidenceValidator::new(EvidenceConfig::default());
        let pages = vec![page(
            "https://www.japan.gov/food",
            "Gov Food",
            "The ramen and izakaya culture across the country is widely praised by culinary writers everywhere. ",
        )];

        let evidence = validator
            .validate_theme_evidence("ramen culture", "destination", &pages, "Tokyo")
            .await;

        assert_eq!(evidence.total_evidence_count, 0);
    }

    #[tokio::test]
    async fn test_report_aggregates_themes() {
        let validator = EvidenceValidator::new(EvidenceConfig::default());
        let body = format!(
            "{}{}{}",
            tokyo_sentence("izakaya nightlife"),
            tokyo_sentence("izakaya dining"),
            tokyo_sentence("izakaya culture")
        );
        let pages = vec![
            page("https://www.japan.gov/nightlife", "Gov Guide", &body),
            page("https://www.lonelyplanet.com/tokyo", "Lonely Planet", &body),
        ];
        let themes = vec![
            ("izakaya nightlife".to_string(), "destination".to_string()),
            ("quantum physics".to_string(), "destination".to_string()),
        ];

        let report = validator.build_report(&themes, &pages, "Tokyo").await;
        assert_eq!(report.themes_validated, 2);
        assert_eq!(report.validated_count, 1);
        assert_eq!(report.unvalidated_count, 1);
        assert!(report.overall_confidence > 0.0);
    }
}
