//! Anthropic provider: Messages API for synchronous structured calls and
//! the Message Batches API for asynchronous bulk processing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::batch::{BatchRequest, BatchResult, BatchState, BatchStatus, BatchSubmission};
use crate::error::LlmError;
use crate::provider::{BatchLlmProvider, LlmProvider, ResponseFormat};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Context window applied to current Claude models.
const DEFAULT_CONTEXT_WINDOW: usize = 200_000;

/// Anthropic HTTP provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a provider with an explicit key and model.
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Create a provider from `ANTHROPIC_API_KEY` (and optional
    /// `ANTHROPIC_MODEL`) in the environment.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::Misconfiguration(
                "Anthropic API key not found in environment variable 'ANTHROPIC_API_KEY'"
                    .to_string(),
            )
        })?;
        let model = std::env::var("ANTHROPIC_MODEL").ok();
        Self::new(api_key, model, None)
    }

    fn system_prompt(schema: &Value) -> String {
        format!(
            "Respond with a single JSON object conforming to this JSON Schema. \
             Output only the JSON object, with no surrounding prose or markdown.\n\n{schema}"
        )
    }

    fn message_params(&self, prompt: &str, format: &ResponseFormat) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt(&format.schema)),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }

    /// Send a request, retrying once on connection failure.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LlmError> {
        match build().send().await {
            Ok(response) => Self::check_status(response).await,
            Err(first) => {
                debug!(error = %first, "Anthropic request failed, retrying once");
                let response = build()
                    .send()
                    .await
                    .map_err(|e| LlmError::Connection(e.to_string()))?;
                Self::check_status(response).await
            }
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(LlmError::Connection(format!("HTTP {status}: {body}")))
        } else {
            Err(LlmError::Provider(format!("HTTP {status}: {body}")))
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
    }
}

/// Extract the structured JSON object from a response's text blocks.
fn parse_structured_text(content: &[ContentBlock]) -> Result<Value, LlmError> {
    let text: String = content
        .iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        return Err(LlmError::ResponseParse(
            "response contained no text content".to_string(),
        ));
    }

    // Models occasionally wrap the object in a markdown fence despite the
    // instruction; strip it before parsing.
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_start_matches('\n'))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(stripped.trim())
        .map_err(|e| LlmError::ResponseParse(format!("invalid JSON in response: {e}")))
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        DEFAULT_CONTEXT_WINDOW
    }

    async fn invoke_structured(
        &self,
        prompt: &str,
        format: &ResponseFormat,
    ) -> Result<Value, LlmError> {
        debug!(model = %self.model, "Invoking Anthropic Messages API");

        let params = self.message_params(prompt, format);
        let response = self
            .send_with_retry(|| {
                self.request(reqwest::Method::POST, "/v1/messages")
                    .json(&params)
            })
            .await?;

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParse(format!("malformed response body: {e}")))?;

        parse_structured_text(&body.content)
    }

    fn as_batch(&self) -> Option<&dyn BatchLlmProvider> {
        Some(self)
    }
}

#[async_trait]
impl BatchLlmProvider for AnthropicProvider {
    async fn submit_batch(&self, requests: &[BatchRequest]) -> Result<BatchSubmission, LlmError> {
        let body = BatchCreateRequest {
            requests: requests
                .iter()
                .map(|request| BatchCreateEntry {
                    custom_id: request.custom_id.clone(),
                    params: MessagesRequest {
                        model: request.model.clone(),
                        max_tokens: self.max_tokens,
                        system: Some(Self::system_prompt(&request.response_schema)),
                        messages: vec![ApiMessage {
                            role: "user".to_string(),
                            content: request.prompt.clone(),
                        }],
                    },
                })
                .collect(),
        };

        let response = self
            .send_with_retry(|| {
                self.request(reqwest::Method::POST, "/v1/messages/batches")
                    .json(&body)
            })
            .await?;

        let created: BatchCreated = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParse(format!("malformed batch response: {e}")))?;

        Ok(BatchSubmission {
            batch_id: created.id,
            request_count: requests.len(),
        })
    }

    async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatus, LlmError> {
        let response = self
            .send_with_retry(|| {
                self.request(
                    reqwest::Method::GET,
                    &format!("/v1/messages/batches/{batch_id}"),
                )
            })
            .await?;

        let status: BatchStatusResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParse(format!("malformed status response: {e}")))?;

        Ok(BatchStatus {
            batch_id: batch_id.to_string(),
            state: status.state(),
        })
    }

    async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResult>, LlmError> {
        let response = self
            .send_with_retry(|| {
                self.request(
                    reqwest::Method::GET,
                    &format!("/v1/messages/batches/{batch_id}/results"),
                )
            })
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        // Results arrive as JSON Lines, one object per request.
        let mut results = Vec::new();
        for line in body.lines().filter(|line| !line.trim().is_empty()) {
            let entry: BatchResultLine = serde_json::from_str(line)
                .map_err(|e| LlmError::ResponseParse(format!("malformed result line: {e}")))?;

            let succeeded = entry.result.result_type == "succeeded";
            let response = if succeeded {
                entry
                    .result
                    .message
                    .as_ref()
                    .and_then(|message| parse_structured_text(&message.content).ok())
            } else {
                None
            };

            results.push(BatchResult {
                custom_id: entry.custom_id,
                // A succeeded entry whose text is not valid JSON counts as
                // failed; the cache entry must not hold garbage.
                succeeded: succeeded && response.is_some(),
                response,
            });
        }

        Ok(results)
    }

    async fn cancel_batch(&self, batch_id: &str) -> Result<(), LlmError> {
        self.send_with_retry(|| {
            self.request(
                reqwest::Method::POST,
                &format!("/v1/messages/batches/{batch_id}/cancel"),
            )
        })
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchCreateRequest {
    requests: Vec<BatchCreateEntry>,
}

#[derive(Debug, Serialize)]
struct BatchCreateEntry {
    custom_id: String,
    params: MessagesRequest,
}

#[derive(Debug, Deserialize)]
struct BatchCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchStatusResponse {
    processing_status: String,
    #[serde(default)]
    request_counts: RequestCounts,
}

#[derive(Debug, Default, Deserialize)]
struct RequestCounts {
    #[serde(default)]
    succeeded: u64,
    #[serde(default)]
    errored: u64,
    #[serde(default)]
    canceled: u64,
    #[serde(default)]
    expired: u64,
}

impl BatchStatusResponse {
    fn state(&self) -> BatchState {
        match self.processing_status.as_str() {
            "ended" => {
                let failures =
                    self.request_counts.errored + self.request_counts.canceled + self.request_counts.expired;
                if self.request_counts.succeeded == 0 && failures > 0 {
                    BatchState::Failed
                } else {
                    BatchState::Completed
                }
            }
            "canceling" => BatchState::Cancelled,
            _ => BatchState::InProgress,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchResultLine {
    custom_id: String,
    result: BatchResultBody,
}

#[derive(Debug, Deserialize)]
struct BatchResultBody {
    #[serde(rename = "type")]
    result_type: String,
    message: Option<MessagesResponse>,
}
