//! Anthropic Claude provider implementation

use async_trait::async_trait;
use reqwest::Client;

use super::provider::{
    ChatMessage, ChatRequest, ChatResponse, LlmProvider, MessageRole, ProviderError, ProviderType,
    TokenUsage,
};

/// Anthropic Claude API provider
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok();

        if api_key.is_some() {
            tracing::info!("[ANTHROPIC] provider initialized with API key");
        } else {
            tracing::warn!("[ANTHROPIC] no API key found (ANTHROPIC_API_KEY not set)");
        }

        Self {
            client: Client::new(),
            api_key,
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }

    /// Custom endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.endpoint = endpoint.into();
        provider
    }

    /// Anthropic takes the system prompt as a separate parameter
    fn messages_to_anthropic(
        messages: &[ChatMessage],
    ) -> (Option<String>, Vec<serde_json::Value>) {
        let mut system_prompt: Option<String> = None;
        let mut api_messages: Vec<serde_json::Value> = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => match system_prompt {
                    None => system_prompt = Some(msg.content.clone()),
                    Some(ref mut s) => {
                        s.push_str("\n\n");
                        s.push_str(&msg.content);
                    }
                },
                MessageRole::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": msg.content
                })),
                MessageRole::Assistant => api_messages.push(serde_json::json!({
                    "role": "assistant",
                    "content": msg.content
                })),
            }
        }

        (system_prompt, api_messages)
    }

    fn parse_response(json: &serde_json::Value) -> Result<ChatResponse, ProviderError> {
        let usage = json.get("usage").and_then(|u| {
            let input = u["input_tokens"].as_u64()?;
            let output = u["output_tokens"].as_u64()?;
            Some(TokenUsage {
                input_tokens: input as u32,
                output_tokens: output as u32,
                total_tokens: (input + output) as u32,
            })
        });

        // Concatenate text content blocks
        let content = json["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| {
                        if b["type"].as_str() == Some("text") {
                            b["text"].as_str()
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ProviderError::ParseError("missing content blocks".to_string()))?
            .trim()
            .to_string();

        Ok(ChatResponse { content, usage })
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    fn name(&self) -> &'static str {
        "Anthropic"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn default_model(&self) -> &str {
        "claude-3-5-haiku-latest"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderError::AuthError("No Anthropic API key configured".to_string())
        })?;

        let (system_prompt, messages) = Self::messages_to_anthropic(&request.messages);

        let mut payload = serde_json::json!({
            "model": request.config.model,
            "max_tokens": request.config.max_tokens,
            "temperature": request.config.temperature,
            "messages": messages
        });
        if let Some(system) = system_prompt {
            payload["system"] = serde_json::json!(system);
        }

        tracing::debug!(
            "[ANTHROPIC] sending request: model={}, messages={}",
            request.config.model,
            messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
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
    fn test_system_prompt_is_separated() {
        let messages = vec![
            ChatMessage::system("You generate travel nuances"),
            ChatMessage::user("Tokyo phrases"),
        ];
        let (system, api_messages) = AnthropicProvider::messages_to_anthropic(&messages);
        assert_eq!(system.as_deref(), Some("You generate travel nuances"));
        assert_eq!(api_messages.len(), 1);
        assert_eq!(api_messages[0]["role"], "user");
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let json = serde_json::json!({
            "content": [
                {"type": "text", "text": "golden gai bar hopping\n"},
                {"type": "text", "text": "depachika food halls"}
            ],
            "usage": {"input_tokens": 20, "output_tokens": 10}
        });
        let response = AnthropicProvider::parse_response(&json).unwrap();
        assert!(response.content.contains("golden gai"));
        assert!(response.content.contains("depachika"));
        assert_eq!(response.usage.unwrap().total_tokens, 30);
    }
}
