//! Provider traits: synchronous structured output plus optional batch
//! capability.

use async_trait::async_trait;
use serde_json::Value;

use crate::batch::{BatchRequest, BatchResult, BatchStatus, BatchSubmission};
use crate::error::LlmError;

/// The response shape requested from the provider: a schema name (part of
/// the cache key) and the JSON Schema the response must conform to.
#[derive(Debug, Clone)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

impl ResponseFormat {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Derive the format from a response model type.
    #[must_use]
    pub fn for_type<R: schemars::JsonSchema>() -> Self {
        let schema = schemars::schema_for!(R);
        let name = std::any::type_name::<R>()
            .rsplit("::")
            .next()
            .unwrap_or("Response")
            .to_string();
        Self {
            name,
            schema: serde_json::to_value(schema).unwrap_or(Value::Null),
        }
    }
}

/// An LLM provider capable of structured completions.
///
/// `as_batch` surfaces the optional asynchronous batch capability; the
/// service branches on it to choose between the sync path and batch
/// submission.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider identifier (`anthropic`), recorded in batch jobs.
    fn provider_name(&self) -> &str;

    /// Model identifier used for cache keys and context-window lookup.
    fn model_name(&self) -> &str;

    /// Maximum tokens the model accepts in one request.
    fn context_window(&self) -> usize;

    /// Invoke the model and return a JSON response conforming to `format`.
    async fn invoke_structured(
        &self,
        prompt: &str,
        format: &ResponseFormat,
    ) -> Result<Value, LlmError>;

    /// Batch capability, if this provider supports it.
    fn as_batch(&self) -> Option<&dyn BatchLlmProvider> {
        None
    }
}

/// Asynchronous batch API operations.
#[async_trait]
pub trait BatchLlmProvider: Send + Sync {
    /// Submit multiple prompts as one batch.
    async fn submit_batch(&self, requests: &[BatchRequest]) -> Result<BatchSubmission, LlmError>;

    /// Poll a batch's processing status.
    async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatus, LlmError>;

    /// Retrieve per-prompt results for a completed batch.
    async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResult>, LlmError>;

    /// Cancel an in-progress batch.
    async fn cancel_batch(&self, batch_id: &str) -> Result<(), LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct ValidationVerdict {
        finding_id: String,
        valid: bool,
    }

    #[test]
    fn for_type_uses_the_bare_type_name() {
        let format = ResponseFormat::for_type::<ValidationVerdict>();
        assert_eq!(format.name, "ValidationVerdict");
        assert!(format.schema.is_object());
    }
}
