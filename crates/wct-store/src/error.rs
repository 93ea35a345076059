use thiserror::Error;

/// Errors raised by artifact store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact '{key}' not found in run '{run_id}'")]
    ArtifactNotFound { run_id: String, key: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Stored document at '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Serde(#[from] serde_json::Error),
}
