//! Evidence collection, scoring, and deduplication

pub mod dedup;
pub mod validator;

pub use dedup::{DedupConfig, DedupOutcome, EvidenceDedupRegistry};
pub use validator::{classify_source, rate_quality, score_authority, EvidenceConfig, EvidenceValidator};
