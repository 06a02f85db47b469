//! Core data model shared across the pipeline
//!
//! Evidence, themes, nuance phrases, agent envelopes, and workflow results.
//! Scores are clamped to [0, 1] at construction so downstream code never
//! has to re-validate ranges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Source category for an evidence page, classified from its URL/title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Government,
    Education,
    MajorTravel,
    NewsMedia,
    TravelBlog,
    SocialMedia,
    LocalBusiness,
    TourismBoard,
    Unknown,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Government => "government",
            SourceType::Education => "education",
            SourceType::MajorTravel => "major_travel",
            SourceType::NewsMedia => "news_media",
            SourceType::TravelBlog => "travel_blog",
            SourceType::SocialMedia => "social_media",
            SourceType::LocalBusiness => "local_business",
            SourceType::TourismBoard => "tourism_board",
            SourceType::Unknown => "unknown",
        }
    }

    /// Base authority weight for this source category
    pub fn base_authority(&self) -> f64 {
        match self {
            SourceType::Government => 1.0,
            SourceType::Education => 0.9,
            SourceType::MajorTravel => 0.8,
            SourceType::TourismBoard => 0.75,
            SourceType::NewsMedia => 0.7,
            SourceType::TravelBlog => 0.5,
            SourceType::LocalBusiness => 0.4,
            SourceType::SocialMedia => 0.3,
            SourceType::Unknown => 0.2,
        }
    }
}

/// Quality tier assigned to an evidence piece from its authority and length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Rejected,
}

impl QualityRating {
    pub fn is_strong(&self) -> bool {
        matches!(self, QualityRating::Excellent | QualityRating::Good)
    }
}

/// Validation outcome for a theme after evidence collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Validated,
    PartiallyValidated,
    Unvalidated,
    Conflicting,
    Pending,
}

/// One supporting text fragment extracted from a web page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePiece {
    pub text_content: String,
    pub source_url: String,
    pub source_title: String,
    pub source_type: SourceType,
    pub authority_score: f64,
    pub quality_rating: QualityRating,
    pub relevance_score: f64,
    pub word_count: usize,
    pub mentions_destination: bool,
    pub matched_keywords: Vec<String>,
    pub semantic_similarity: Option<f64>,
    pub collected_at: DateTime<Utc>,
}

impl EvidencePiece {
    /// Build a piece with text capped and scores clamped
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: &str,
        source_url: &str,
        source_title: &str,
        source_type: SourceType,
        authority_score: f64,
        quality_rating: QualityRating,
        relevance_score: f64,
        mentions_destination: bool,
        matched_keywords: Vec<String>,
    ) -> Self {
        let text_content: String = text.chars().take(1000).collect();
        let word_count = text_content.split_whitespace().count();
        Self {
            text_content,
            source_url: source_url.to_string(),
            source_title: source_title.to_string(),
            source_type,
            authority_score: clamp01(authority_score),
            quality_rating,
            relevance_score: clamp01(relevance_score),
            word_count,
            mentions_destination,
            matched_keywords,
            semantic_similarity: None,
            collected_at: Utc::now(),
        }
    }
}

/// Aggregated evidence for one theme. Created fresh per validation run and
/// never mutated afterwards; re-validation replaces the whole record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeEvidence {
    pub theme: String,
    pub destination: String,
    pub pieces: Vec<EvidencePiece>,
    pub total_evidence_count: usize,
    pub unique_source_count: usize,
    pub validation_status: ValidationStatus,
    pub validation_confidence: f64,
    pub average_authority: f64,
    pub average_relevance: f64,
    pub meets_minimum_evidence: bool,
    pub meets_source_diversity: bool,
    pub meets_quality_threshold: bool,
    pub evidence_gaps: Vec<String>,
}

/// Prompt/claim category for nuance generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NuanceCategory {
    Destination,
    Hotel,
    VacationRental,
}

impl NuanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NuanceCategory::Destination => "destination",
            NuanceCategory::Hotel => "hotel",
            NuanceCategory::VacationRental => "vacation_rental",
        }
    }

    pub const ALL: [NuanceCategory; 3] = [
        NuanceCategory::Destination,
        NuanceCategory::Hotel,
        NuanceCategory::VacationRental,
    ];

    /// Reported (not enforced) minimum phrase count per category
    pub fn target_minimum(&self) -> usize {
        match self {
            NuanceCategory::Destination => 8,
            NuanceCategory::Hotel | NuanceCategory::VacationRental => 6,
        }
    }
}

impl std::fmt::Display for NuanceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A short candidate claim phrase, immutable once scored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuancePhrase {
    pub phrase: String,
    pub category: NuanceCategory,
    pub score: f64,
    pub search_hits: usize,
    pub evidence_sources: Vec<String>,
    pub source_urls: Vec<String>,
    pub contributing_models: Vec<String>,
    pub validation_metadata: Value,
}

impl NuancePhrase {
    pub fn new(phrase: &str, category: NuanceCategory, score: f64) -> Self {
        Self {
            phrase: phrase.to_string(),
            category,
            score: clamp01(score),
            search_hits: 0,
            evidence_sources: Vec::new(),
            source_urls: Vec::new(),
            contributing_models: Vec::new(),
            validation_metadata: Value::Null,
        }
    }
}

/// Collection of validated phrases across the three nuance categories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NuanceCollection {
    pub destination_nuances: Vec<NuancePhrase>,
    pub hotel_expectations: Vec<NuancePhrase>,
    pub vacation_rental_expectations: Vec<NuancePhrase>,
}

impl NuanceCollection {
    pub fn total_count(&self) -> usize {
        self.destination_nuances.len()
            + self.hotel_expectations.len()
            + self.vacation_rental_expectations.len()
    }

    pub fn category_count(&self, category: NuanceCategory) -> usize {
        self.phrases(category).len()
    }

    pub fn phrases(&self, category: NuanceCategory) -> &[NuancePhrase] {
        match category {
            NuanceCategory::Destination => &self.destination_nuances,
            NuanceCategory::Hotel => &self.hotel_expectations,
            NuanceCategory::VacationRental => &self.vacation_rental_expectations,
        }
    }

    pub fn push(&mut self, phrase: NuancePhrase) {
        match phrase.category {
            NuanceCategory::Destination => self.destination_nuances.push(phrase),
            NuanceCategory::Hotel => self.hotel_expectations.push(phrase),
            NuanceCategory::VacationRental => self.vacation_rental_expectations.push(phrase),
        }
    }

    /// Mean score per category, for categories with at least one phrase
    pub fn quality_scores(&self) -> Vec<(NuanceCategory, f64)> {
        NuanceCategory::ALL
            .iter()
            .filter_map(|&cat| {
                let phrases = self.phrases(cat);
                if phrases.is_empty() {
                    None
                } else {
                    let mean = phrases.iter().map(|p| p.score).sum::<f64>() / phrases.len() as f64;
                    Some((cat, mean))
                }
            })
            .collect()
    }
}

/// The user-facing unit: a travel-interest theme with adjustable confidence.
/// `confidence` is adjusted exactly once per validation pass; the value the
/// LLM originally assigned stays in `original_confidence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeData {
    pub theme: String,
    pub category: String,
    pub confidence: f64,
    pub original_confidence: Option<f64>,
    pub description: String,
    #[serde(default)]
    pub sub_themes: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub evidence_summary: Option<Value>,
}

impl ThemeData {
    pub fn new(theme: &str, category: &str, confidence: f64) -> Self {
        Self {
            theme: theme.to_string(),
            category: category.to_string(),
            confidence: clamp01(confidence),
            original_confidence: None,
            description: String::new(),
            sub_themes: Vec::new(),
            rationale: String::new(),
            evidence_summary: None,
        }
    }
}

/// Status of one agent task call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Error,
    Pending,
}

/// Uniform envelope returned by every agent task call. Callers must check
/// `status` before assuming anything about the inner `data` type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: TaskStatus,
    pub data: Option<Value>,
    pub error_message: Option<String>,
    pub agent_id: String,
    pub task_id: String,
    pub processing_time: f64,
}

impl AgentResponse {
    pub fn success(data: Value, agent_id: &str, task_id: &str, processing_time: f64) -> Self {
        Self {
            status: TaskStatus::Success,
            data: Some(data),
            error_message: None,
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
            processing_time,
        }
    }

    pub fn error(message: &str, agent_id: &str, task_id: &str, processing_time: f64) -> Self {
        Self {
            status: TaskStatus::Error,
            data: None,
            error_message: Some(message.to_string()),
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
            processing_time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// Task handed to an agent: a type tag plus free-form payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_type: String,
    pub data: Value,
}

impl TaskDefinition {
    pub fn new(task_type: &str, data: Value) -> Self {
        Self {
            task_type: task_type.to_string(),
            data,
        }
    }
}

/// One fetched web page scored for discovery quality
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebContent {
    pub url: String,
    pub title: String,
    pub content: String,
    pub relevance_score: f64,
    pub quality_score: f64,
    pub authority_score: f64,
}

impl WebContent {
    pub fn new(
        url: &str,
        title: &str,
        content: &str,
        relevance_score: f64,
        quality_score: f64,
        authority_score: f64,
    ) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            relevance_score: clamp01(relevance_score),
            quality_score: clamp01(quality_score),
            authority_score: clamp01(authority_score),
        }
    }
}

/// Output of the web discovery phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDiscoveryResult {
    pub destination: String,
    pub content: Vec<WebContent>,
    pub sources_analyzed: usize,
    pub sources_successful: usize,
    pub average_quality: f64,
    pub errors: Vec<String>,
}

impl WebDiscoveryResult {
    pub fn new(destination: &str, content: Vec<WebContent>, sources_analyzed: usize) -> Self {
        let sources_successful = content.len();
        let average_quality = if content.is_empty() {
            0.0
        } else {
            content.iter().map(|c| c.quality_score).sum::<f64>() / content.len() as f64
        };
        Self {
            destination: destination.to_string(),
            content,
            sources_analyzed,
            sources_successful,
            average_quality,
            errors: Vec::new(),
        }
    }
}

/// Output of the LLM processing phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProcessingResult {
    pub destination: String,
    pub themes: Vec<ThemeData>,
    pub quality_score: f64,
    pub errors: Vec<String>,
}

impl LlmProcessingResult {
    pub fn new(destination: &str, themes: Vec<ThemeData>) -> Self {
        let quality_score = if themes.is_empty() {
            0.0
        } else {
            themes.iter().map(|t| t.confidence).sum::<f64>() / themes.len() as f64
        };
        Self {
            destination: destination.to_string(),
            themes,
            quality_score,
            errors: Vec::new(),
        }
    }
}

/// Output of the intelligence enhancement branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub destination: String,
    pub enhanced_themes: Vec<ThemeData>,
    pub insights: Value,
    pub quality_score: f64,
    pub errors: Vec<String>,
}

/// Per-destination summary of the evidence validation branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceValidationReport {
    pub destination: String,
    pub themes_validated: usize,
    pub validated_count: usize,
    pub partially_validated_count: usize,
    pub unvalidated_count: usize,
    pub overall_confidence: f64,
    pub evidence_gaps: Vec<String>,
    pub theme_evidence: Vec<ThemeEvidence>,
}

/// Output of the quality assurance phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssuranceResult {
    pub destination: String,
    pub quality_metrics: Value,
    pub interventions: Vec<String>,
    pub recommendations: Vec<String>,
    pub overall_score: f64,
}

/// Final result for one destination workflow. Always returned, success or
/// not; a failed run keeps its completed-phases list for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: Uuid,
    pub destination: String,
    pub success: bool,
    pub final_data: Value,
    pub quality_score: f64,
    pub phases_completed: Vec<String>,
    pub error_messages: Vec<String>,
    pub duration_ms: u64,
}
