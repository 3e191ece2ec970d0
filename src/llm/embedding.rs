//! Text embeddings via the OpenAI embeddings endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::LlmError;
use super::openai::{http_client, post_json};
use crate::config::{EmbeddingConfig, LlmConfig};

/// Maps texts to dense vectors, one per input, in input order
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Model identifier; part of every cache key
    fn model(&self) -> &str;
}

/// OpenAI embeddings client
pub struct OpenAIEmbeddings {
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
    batch_size: usize,
    http: Client,
    timeout: Duration,
}

impl OpenAIEmbeddings {
    /// Shares endpoint and credential settings with the chat client
    pub fn from_config(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(llm.timeout_seconds.into());
        Ok(Self {
            model: embedding.model.clone(),
            api_key: llm.get_api_key().ok(),
            api_key_env: llm.api_key_env.clone(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            batch_size: embedding.batch_size.max(1) as usize,
            http: http_client(timeout)?,
            timeout,
        })
    }

    async fn embed_batch(&self, api_key: &str, batch: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": batch,
        });

        let response = post_json(&self.http, &url, api_key, &body, self.timeout).await?;
        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("undecodable embeddings: {e}")))?;

        if parsed.data.len() != batch.len() {
            return Err(LlmError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingCredential(self.api_key_env.clone()))?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "embed: sending batch");
            vectors.extend(self.embed_batch(api_key, batch).await?);
        }
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn embeddings(base_url: String, batch_size: usize) -> OpenAIEmbeddings {
        OpenAIEmbeddings {
            model: "text-embedding-3-small".to_string(),
            api_key: Some("sk-test".to_string()),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url,
            batch_size,
            http: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_embed_restores_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .json_body_partial(r#"{"model":"text-embedding-3-small"}"#);
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [
                        { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                        { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                    ],
                    "model": "text-embedding-3-small"
                }));
            })
            .await;

        let client = embeddings(server.url(""), 16);
        let vectors = client
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_batches_requests() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [0.5] }]
                }));
            })
            .await;

        let client = embeddings(server.url(""), 1);
        let vectors = client
            .embed(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        mock.assert_hits_async(3).await;
        assert_eq!(vectors.len(), 3);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        let err = embeddings(server.url(""), 8)
            .embed(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
