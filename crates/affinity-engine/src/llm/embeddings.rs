//! Text embedding client for semantic similarity
//!
//! Used by the consensus engine and theme deduplication to compare short
//! phrases by cosine similarity rather than exact match.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::ProviderError;

/// Cosine similarity between two vectors; 0.0 when either is empty or
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Anything that can embed a batch of texts, ordering preserved
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    fn model_id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embeddings endpoint client
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
        }
    }

    /// text-embedding-3-small, keyed from the environment
    pub fn from_env() -> Option<Self> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|key| Self::new(key, "text-embedding-3-small"))
    }
}

#[async_trait]
impl TextEmbedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::ParseError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Ollama embeddings endpoint client (one text per request)
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextEmbedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let payload = serde_json::json!({ "model": self.model, "prompt": text });
            let url = format!("{}/api/embeddings", self.base_url);
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| ProviderError::NotAvailable(format!("Ollama unreachable: {}", e)))?;

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;

            let embedding: Vec<f32> = json["embedding"]
                .as_array()
                .ok_or_else(|| ProviderError::ParseError("missing embedding array".to_string()))?
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            out.push(embedding);
        }
        Ok(out)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identity_and_orthogonal() {
        let a = vec![1.0f32, 0.0, 0.0];
        let b = vec![0.0f32, 1.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_static_embedder_batch_ordering() {
        use test_support::StaticEmbedder;
        let embedder = StaticEmbedder::new(&[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
        ]);
        let vectors = embedder
            .embed_batch(&["b".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0], vec![0.0, 1.0]);
        assert_eq!(vectors[1], vec![1.0, 0.0]);
    }
}
