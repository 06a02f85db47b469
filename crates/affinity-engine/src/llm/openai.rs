//! OpenAI provider implementation

use async_trait::async_trait;
use reqwest::Client;

use super::provider::{
    ChatMessage, ChatRequest, ChatResponse, LlmProvider, MessageRole, ProviderError, ProviderType,
    TokenUsage,
};

/// OpenAI API provider
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();

        if api_key.is_some() {
            tracing::info!("[OPENAI] provider initialized with API key");
        } else {
            tracing::warn!("[OPENAI] no API key found (OPENAI_API_KEY not set)");
        }

        Self {
            client: Client::new(),
            api_key,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }

    /// Custom endpoint, e.g. an OpenAI-compatible proxy
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.endpoint = endpoint.into();
        provider
    }

    fn message_to_json(msg: &ChatMessage) -> serde_json::Value {
        let role = match msg.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        serde_json::json!({ "role": role, "content": msg.content })
    }

    fn parse_response(json: &serde_json::Value) -> Result<ChatResponse, ProviderError> {
        let usage = json.get("usage").and_then(|u| {
            Some(TokenUsage {
                input_tokens: u["prompt_tokens"].as_u64()? as u32,
                output_tokens: u["completion_tokens"].as_u64()? as u32,
                total_tokens: u["total_tokens"].as_u64()? as u32,
            })
        });

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::ParseError("missing message content".to_string()))?
            .trim()
            .to_string();

        Ok(ChatResponse { content, usage })
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn default_model(&self) -> &str {
        "gpt-4o-mini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let auth_header = self
            .api_key
            .as_ref()
            .map(|k| format!("Bearer {}", k))
            .ok_or_else(|| ProviderError::AuthError("No OpenAI API key configured".to_string()))?;

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(Self::message_to_json)
            .collect();

        let payload = serde_json::json!({
            "model": request.config.model,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "messages": messages
        });

        tracing::debug!(
            "[OPENAI] sending request: model={}, messages={}",
            request.config.model,
            messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", auth_header)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited {
                    retry_after_ms: None,
                });
            }

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Self::parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let msg = ChatMessage::user("Hello");
        let json = OpenAiProvider::message_to_json(&msg);
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "Hello");

        let msg = ChatMessage::system("You are helpful");
        let json = OpenAiProvider::message_to_json(&msg);
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn test_parse_response_extracts_content_and_usage() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "  rooftop izakaya alleys  "}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let response = OpenAiProvider::parse_response(&json).unwrap();
        assert_eq!(response.content, "rooftop izakaya alleys");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_response_missing_content_is_error() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            OpenAiProvider::parse_response(&json),
            Err(ProviderError::ParseError(_))
        ));
    }
}
