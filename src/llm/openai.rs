//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API. The
//! request helpers are shared with the embeddings client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, StopReason, TokenUsage,
    ToolCall,
};
use crate::config::LlmConfig;

/// Build the HTTP client used for OpenAI-compatible endpoints
pub(crate) fn http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("TravelPack/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(LlmError::Network)
}

/// POST a JSON body with bearer auth; single attempt, status mapped to [`LlmError`]
pub(crate) async fn post_json(
    http: &Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    timeout: Duration,
) -> Result<Response, LlmError> {
    let response = http
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(timeout)
            } else {
                LlmError::Network(e)
            }
        })?;

    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        warn!(retry_after, "post_json: rate limited (429)");
        return Err(LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    if !response.status().is_success() {
        let message = response.text().await.unwrap_or_default();
        warn!(status, "post_json: API error");
        return Err(LlmError::ApiError { status, message });
    }

    Ok(response)
}

/// OpenAI chat-completions client
pub struct OpenAIClient {
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    base_url: String,
    http: Client,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration.
    ///
    /// A missing API key is not an error here; it is reported on the first
    /// completion so the rest of the application can still start.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config.get_api_key().ok();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "from_config: no API key configured");
        }

        let timeout = Duration::from_secs(config.timeout_seconds.into());

        Ok(Self {
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http: http_client(timeout)?,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    /// Build the request body for the OpenAI API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(request.messages.iter().map(Self::convert_message));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": request.max_tokens.min(self.max_tokens),
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(
                request
                    .tools
                    .iter()
                    .map(|t| t.to_openai_schema())
                    .collect::<Vec<_>>()
            );
            body["tool_choice"] = match &request.tool_choice {
                Some(name) => serde_json::json!({
                    "type": "function",
                    "function": { "name": name }
                }),
                None => serde_json::json!("auto"),
            };
        }

        body
    }

    fn convert_message(message: &Message) -> serde_json::Value {
        serde_json::json!({
            "role": message.role,
            "content": message.content,
        })
    }

    /// Parse the OpenAI API response
    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let input = serde_json::from_str(&tc.function.arguments).map_err(|e| {
                    LlmError::InvalidResponse(format!(
                        "tool call '{}' has malformed arguments: {e}",
                        tc.function.name
                    ))
                })?;
                Ok(ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    input,
                })
            })
            .collect::<Result<Vec<_>, LlmError>>()?;

        let stop_reason = choice
            .finish_reason
            .as_deref()
            .map_or(StopReason::EndTurn, StopReason::from_openai);

        let usage = api_response.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content,
            tool_calls,
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, max_tokens = request.max_tokens, tools = request.tools.len(), "complete: called");
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingCredential(self.api_key_env.clone()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = post_json(&self.http, &url, api_key, &body, self.timeout).await?;
        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("undecodable completion: {e}")))?;
        let parsed = self.parse_response(api_response)?;

        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            stop_reason = ?parsed.stop_reason,
            "complete: success"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(base_url: &str, api_key: Option<&str>) -> OpenAIClient {
        OpenAIClient {
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.map(str::to_string),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: base_url.to_string(),
            http: Client::new(),
            temperature: 0.7,
            max_tokens: 1200,
            timeout: Duration::from_secs(5),
        }
    }

    fn request(tools: Vec<ToolDefinition>, tool_choice: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Hello")],
            tools,
            tool_choice: tool_choice.map(str::to_string),
            max_tokens: 5000,
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let body = client("https://api.openai.com/v1", Some("k")).build_request_body(&request(vec![], None));

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1200);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are helpful");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_build_request_body_forced_tool() {
        let tool = ToolDefinition::new("record_trip_request", "Record", json!({"type": "object"}));
        let body = client("https://api.openai.com/v1", Some("k"))
            .build_request_body(&request(vec![tool], Some("record_trip_request")));

        assert_eq!(body["tools"][0]["function"]["name"], "record_trip_request");
        assert_eq!(body["tool_choice"]["function"]["name"], "record_trip_request");
    }

    #[tokio::test]
    async fn test_complete_parses_tool_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-1",
                    "choices": [{
                        "index": 0,
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {
                                    "name": "record_trip_request",
                                    "arguments": "{\"location\":\"Chicago\",\"when\":\"in 7 days\"}"
                                }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }],
                    "usage": { "prompt_tokens": 120, "completion_tokens": 20, "total_tokens": 140 }
                }));
            })
            .await;

        let response = client(&server.url(""), Some("sk-test"))
            .complete(request(vec![], None))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        let call = response.tool_call("record_trip_request").unwrap();
        assert_eq!(call.input["location"], "Chicago");
        assert_eq!(response.usage.input_tokens, 120);
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_before_network() {
        let err = client("http://127.0.0.1:9", None)
            .complete(request(vec![], None))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingCredential(_)));
    }

    #[tokio::test]
    async fn test_complete_maps_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("upstream exploded");
            })
            .await;

        let err = client(&server.url(""), Some("sk-test"))
            .complete(request(vec![], None))
            .await
            .unwrap_err();
        match err {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("upstream"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_maps_rate_limit() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).header("retry-after", "7");
            })
            .await;

        let err = client(&server.url(""), Some("sk-test"))
            .complete(request(vec![], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::RateLimited { retry_after } if retry_after == Duration::from_secs(7)
        ));
    }
}
