//! Explicitly constructed registry of LLM clients
//!
//! Owned by the orchestrator and passed by reference into the fan-out
//! component. The minimum-working-model requirement is enforced here, at
//! construction, so a misconfigured deployment fails at startup instead of
//! failing every request.

use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAiProvider;
use super::provider::{LlmProvider, ProviderError, ProviderType};

/// One usable (provider, model) pairing
#[derive(Clone)]
pub struct ModelHandle {
    pub model_id: String,
    pub provider: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_id", &self.model_id)
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub min_working_models: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_working_models: 2,
        }
    }
}

/// Registry of configured models across providers
pub struct ClientRegistry {
    models: Vec<ModelHandle>,
}

impl ClientRegistry {
    /// Build from explicit (provider, models) pairs, keeping only models
    /// whose provider reports itself configured. Errors if fewer than
    /// `min_working_models` survive.
    pub fn new(
        providers: Vec<(Arc<dyn LlmProvider>, Vec<String>)>,
        config: &RegistryConfig,
    ) -> Result<Self, ProviderError> {
        let mut models = Vec::new();
        for (provider, model_ids) in providers {
            if !provider.is_configured() {
                tracing::warn!(
                    "[REGISTRY] provider {} not configured, skipping {} model(s)",
                    provider.name(),
                    model_ids.len()
                );
                continue;
            }
            for model_id in model_ids {
                models.push(ModelHandle {
                    model_id,
                    provider: Arc::clone(&provider),
                });
            }
        }

        if models.len() < config.min_working_models {
            return Err(ProviderError::ConfigError(format!(
                "only {} working model(s) configured, minimum is {}",
                models.len(),
                config.min_working_models
            )));
        }

        tracing::info!(
            "[REGISTRY] {} model(s) available: {}",
            models.len(),
            models
                .iter()
                .map(|m| m.model_id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { models })
    }

    /// Standard three-provider wiring, one default model each,
    /// keyed from the environment.
    pub fn from_env(config: &RegistryConfig) -> Result<Self, ProviderError> {
        let openai = Arc::new(OpenAiProvider::new());
        let anthropic = Arc::new(AnthropicProvider::new());
        let ollama = Arc::new(OllamaProvider::new());

        let providers: Vec<(Arc<dyn LlmProvider>, Vec<String>)> = vec![
            (
                Arc::clone(&openai) as Arc<dyn LlmProvider>,
                vec![openai.default_model().to_string()],
            ),
            (
                Arc::clone(&anthropic) as Arc<dyn LlmProvider>,
                vec![anthropic.default_model().to_string()],
            ),
            (
                Arc::clone(&ollama) as Arc<dyn LlmProvider>,
                vec![ollama.default_model().to_string()],
            ),
        ];

        Self::new(providers, config)
    }

    pub fn models(&self) -> &[ModelHandle] {
        &self.models
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelHandle> {
        self.models.iter().find(|m| m.model_id == model_id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn provider_types(&self) -> Vec<ProviderType> {
        self.models
            .iter()
            .map(|m| m.provider.provider_type())
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedProvider;
    use super::*;

    #[test]
    fn test_min_working_models_enforced_at_construction() {
        let provider = Arc::new(ScriptedProvider::new(vec![("m1", Ok("hi"))]));
        let result = ClientRegistry::new(
            vec![(provider, vec!["m1".to_string()])],
            &RegistryConfig {
                min_working_models: 2,
            },
        );
        assert!(matches!(result, Err(ProviderError::ConfigError(_))));
    }

    #[test]
    fn test_unconfigured_provider_models_are_skipped() {
        let mut unconfigured = ScriptedProvider::new(vec![("m1", Ok("hi"))]);
        unconfigured.configured = false;
        let configured = ScriptedProvider::new(vec![("m2", Ok("hi"))]);

        let registry = ClientRegistry::new(
            vec![
                (Arc::new(unconfigured) as Arc<dyn LlmProvider>, vec!["m1".to_string()]),
                (Arc::new(configured) as Arc<dyn LlmProvider>, vec!["m2".to_string()]),
            ],
            &RegistryConfig {
                min_working_models: 1,
            },
        )
        .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("m2").is_some());
        assert!(registry.get("m1").is_none());
    }
}
