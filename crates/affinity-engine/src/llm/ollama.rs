//! Ollama local provider (OpenAI-compatible chat endpoint)

use async_trait::async_trait;
use reqwest::Client;

use super::provider::{
    ChatMessage, ChatRequest, ChatResponse, LlmProvider, MessageRole, ProviderError, ProviderType,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama provider for local models. Configured whenever a base URL is
/// known; actual availability is only discovered at request time.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        tracing::info!("[OLLAMA] provider initialized at {}", base_url);
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn message_to_json(msg: &ChatMessage) -> serde_json::Value {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        serde_json::json!({ "role": role, "content": msg.content })
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Ollama
    }

    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn default_model(&self) -> &str {
        "llama3.1"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(Self::message_to_json)
            .collect();

        let payload = serde_json::json!({
            "model": request.config.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.config.temperature,
                "num_predict": request.config.max_tokens
            }
        });

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::NotAvailable(format!("Ollama unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = json["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::ParseError("missing message content".to_string()))?
            .trim()
            .to_string();

        Ok(ChatResponse {
            content,
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_base_url() {
        let provider = OllamaProvider::with_base_url("http://10.0.0.5:11434");
        assert!(provider.is_configured());
        assert_eq!(provider.provider_type(), ProviderType::Ollama);
    }
}
