//! Provider trait and common types for multi-provider LLM support

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Supported LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Anthropic,
    /// Ollama local LLM (OpenAI-compatible)
    Ollama,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "ollama" => Ok(ProviderType::Ollama),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Configuration for a chat request
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// A complete chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub config: ChatConfig,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Text response from an LLM provider
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Trait that all LLM providers must implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> ProviderType;

    /// Get the provider name for logging/display
    fn name(&self) -> &'static str;

    /// Check if this provider is properly configured and ready
    fn is_configured(&self) -> bool;

    /// Get the default model for this provider
    fn default_model(&self) -> &str;

    /// Send a chat request and get a response
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_provider_type_round_trip() {
        assert_eq!(ProviderType::from_str("openai"), Ok(ProviderType::OpenAI));
        assert_eq!(ProviderType::from_str("claude"), Ok(ProviderType::Anthropic));
        assert_eq!(ProviderType::from_str("OLLAMA"), Ok(ProviderType::Ollama));
        assert!(ProviderType::from_str("mistral").is_err());
        assert_eq!(ProviderType::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::system("You generate travel nuances");
        assert_eq!(msg.role, MessageRole::System);
        let msg = ChatMessage::user("List phrases for Tokyo");
        assert_eq!(msg.role, MessageRole::User);
    }
}
