//! LLM and embedding clients
//!
//! Provider-agnostic traits with OpenAI-compatible implementations.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod embedding;
mod error;
mod openai;
mod types;

pub use client::LlmClient;
pub use embedding::{EmbeddingProvider, OpenAIEmbeddings};
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolCall,
    ToolDefinition,
};

use crate::config::{EmbeddingConfig, LlmConfig};

/// Create an LLM client based on the provider specified in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{other}'. Supported: openai"
        ))),
    }
}

/// Create the embedding provider matching the configured LLM provider
pub fn create_embedder(
    llm: &LlmConfig,
    embedding: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, LlmError> {
    debug!(provider = %llm.provider, model = %embedding.model, "create_embedder: called");
    match llm.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbeddings::from_config(llm, embedding)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown embedding provider: '{other}'. Supported: openai"
        ))),
    }
}
