//! Layered engine configuration
//!
//! Defaults come from the component configs themselves; an optional
//! `engine.toml` and `AFFINITY_`-prefixed environment variables override
//! them. Provider API keys stay in the environment (loaded via dotenv)
//! and are read by the providers directly, never stored here.

use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusConfig;
use crate::evidence::dedup::DedupConfig;
use crate::evidence::EvidenceConfig;
use crate::llm::fanout::FanoutConfig;
use crate::reconcile::ReconcileConfig;
use crate::retry::RetryPolicy;
use crate::search::validator::ClaimValidationConfig;
use crate::workflow::WorkflowConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub workflow: WorkflowConfig,
    pub evidence: EvidenceConfig,
    pub fanout: FanoutConfig,
    pub consensus: ConsensusConfig,
    pub reconcile: ReconcileConfig,
    pub claims: ClaimValidationConfig,
    pub dedup: DedupConfig,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            evidence: EvidenceConfig::default(),
            fanout: FanoutConfig::default(),
            consensus: ConsensusConfig::default(),
            reconcile: ReconcileConfig::default(),
            claims: ClaimValidationConfig::default(),
            dedup: DedupConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load with the full layering: struct defaults, then `engine.toml` if
    /// present, then environment variables like
    /// `AFFINITY_WORKFLOW__MAX_WORKFLOW_RETRIES=3`.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let defaults = config::Config::try_from(&EngineConfig::default())?;
        config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("engine").required(false))
            .add_source(config::Environment::with_prefix("AFFINITY").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_component_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.workflow.max_workflow_retries, 2);
        assert_eq!(cfg.workflow.max_parallel_destinations, 3);
        assert_eq!(cfg.fanout.concurrency, 3);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert!((cfg.consensus.similarity_threshold - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_defaults_survive_config_round_trip() {
        let defaults = config::Config::try_from(&EngineConfig::default()).unwrap();
        let cfg: EngineConfig = config::Config::builder()
            .add_source(defaults)
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.workflow.max_workflow_retries, 2);
        assert!((cfg.claims.fallback_accept_threshold - 0.6).abs() < 1e-9);
    }
}
