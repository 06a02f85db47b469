//! Multi-provider LLM support: chat providers, embeddings, client registry,
//! and the nuance-generation fan-out

pub mod anthropic;
pub mod embeddings;
pub mod fanout;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use embeddings::{cosine_similarity, OllamaEmbedder, OpenAiEmbedder, TextEmbedder};
pub use fanout::{parse_phrases, passes_quality_filter, FanoutConfig, FanoutResult, LlmFanout};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    ChatConfig, ChatMessage, ChatRequest, ChatResponse, LlmProvider, MessageRole, ProviderError,
    ProviderType, TokenUsage,
};
pub use registry::{ClientRegistry, ModelHandle, RegistryConfig};
