//! # Affinity Engine
//!
//! Multi-agent workflow engine that generates destination travel affinity
//! themes with a pool of LLMs and validates every theme against web
//! evidence before it ships. Discovery, generation, evidence validation,
//! enhancement, imagery, and quality assurance each run as an agent under
//! a phase-sequencing orchestrator.

pub mod agents;
pub mod cache;
pub mod config;
pub mod consensus;
pub mod evidence;
pub mod llm;
pub mod models;
pub mod reconcile;
pub mod retry;
pub mod search;
pub mod sink;
pub mod workflow;

use std::sync::Arc;

pub use agents::{
    Agent, EnhancementAgent, EvidenceValidationAgent, ImageGenerator, LlmProcessingAgent,
    NoopImageGenerator, QaDecision, QualityAssuranceAgent, SeasonalImageAgent, WebDiscoveryAgent,
};
pub use cache::{CacheKey, CacheStats, CachedResponse, LlmCache, SearchCache};
pub use config::EngineConfig;
pub use consensus::{ConsensusConfig, ConsensusEngine, ConsensusResult};
pub use evidence::{EvidenceConfig, EvidenceDedupRegistry, EvidenceValidator};
pub use llm::{
    ClientRegistry, LlmFanout, LlmProvider, ModelHandle, ProviderError, RegistryConfig,
    TextEmbedder,
};
pub use models::{
    AgentResponse, EnhancementResult, EvidencePiece, EvidenceValidationReport, NuanceCategory,
    NuancePhrase, QualityAssuranceResult, SourceType, TaskDefinition, TaskStatus, ThemeData,
    ThemeEvidence, ValidationStatus, WebContent, WebDiscoveryResult, WorkflowResult,
};
pub use reconcile::{ReconcileConfig, ReconcileEngine};
pub use retry::RetryPolicy;
pub use search::{ClaimValidator, DestinationKnowledgeBase, ExaSearch, SearchClient, SearchError};
pub use sink::{AffinityGraphSink, AffinityUpdate, NoopGraphSink};
pub use workflow::{WorkflowConfig, WorkflowEngine, WorkflowPhase};

/// Main error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),

    #[error("Provider error: {0}")]
    ProviderError(#[from] llm::ProviderError),

    #[error("Search error: {0}")]
    SearchError(#[from] search::SearchError),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Workflow error: {0}")]
    WorkflowError(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Install the global tracing subscriber, honoring `RUST_LOG`
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wire a full engine from configuration and the process environment:
/// providers from API keys, Exa search, caches, and the six phase agents.
pub fn initialize_engine(config: EngineConfig) -> Result<Arc<WorkflowEngine>> {
    tracing::info!("Initializing affinity engine...");

    let registry = Arc::new(ClientRegistry::from_env(&RegistryConfig::default())?);
    let embedder: Option<Arc<dyn TextEmbedder>> = llm::OpenAiEmbedder::from_env()
        .map(|e| Arc::new(e) as Arc<dyn TextEmbedder>);

    let llm_cache = Arc::new(LlmCache::with_defaults());
    let fanout = LlmFanout::new(config.fanout.clone(), config.retry.clone()).with_cache(llm_cache);
    let mut consensus = ConsensusEngine::new(config.consensus.clone());
    if let Some(embedder) = &embedder {
        consensus = consensus.with_embedder(Arc::clone(embedder));
    }

    let search_cache = Arc::new(SearchCache::with_defaults());
    let search = Arc::new(
        SearchClient::new(Arc::new(ExaSearch::new()), config.retry.clone())
            .with_cache(search_cache),
    );

    let mut evidence_validator = EvidenceValidator::new(config.evidence.clone());
    if let Some(embedder) = &embedder {
        evidence_validator = evidence_validator.with_embedder(Arc::clone(embedder));
    }
    let mut reconcile = ReconcileEngine::new(config.reconcile.clone());
    if let Some(embedder) = &embedder {
        reconcile = reconcile.with_embedder(Arc::clone(embedder));
    }

    let llm_processing = LlmProcessingAgent::new(Arc::clone(&registry), fanout, consensus)
        .with_claim_validation(
            Arc::clone(&search),
            ClaimValidator::new(config.claims.clone()),
        );

    let engine = WorkflowEngine::new(
        Arc::new(WebDiscoveryAgent::new(Arc::clone(&search))),
        Arc::new(llm_processing),
        Arc::new(EnhancementAgent::new()),
        Arc::new(
            EvidenceValidationAgent::new(evidence_validator)
                .with_dedup_registry(EvidenceDedupRegistry::new(config.dedup.clone())),
        ),
        Arc::new(SeasonalImageAgent::new(
            Arc::new(NoopImageGenerator),
            config.retry.clone(),
        )),
        Arc::new(QualityAssuranceAgent::new()),
        reconcile,
        config.workflow.clone(),
    )
    .with_sink(Arc::new(NoopGraphSink));

    tracing::info!(
        "Affinity engine initialized with {} model(s) across {:?}",
        registry.len(),
        registry.provider_types()
    );
    Ok(Arc::new(engine))
}
