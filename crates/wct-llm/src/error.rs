use thiserror::Error;

use wct_store::StoreError;

/// Errors raised by the LLM service and its providers.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM provider misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("LLM connection failed: {0}")]
    Connection(String),

    #[error("LLM provider rejected the request: {0}")]
    Provider(String),

    #[error("LLM response could not be parsed as structured output: {0}")]
    ResponseParse(String),

    #[error("Provider '{provider}' does not support batch submission")]
    BatchUnsupported { provider: String },

    #[error("Batch '{batch_id}' is not in a terminal state")]
    BatchNotReady { batch_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("LLM cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
