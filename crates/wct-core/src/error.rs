use thiserror::Error;

/// Errors raised while resolving schema definitions from the registry.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Unknown schema '{name}/{version}'")]
    Unknown { name: String, version: String },

    #[error("Schema definition for '{name}/{version}' failed to compile: {reason}")]
    Compile {
        name: String,
        version: String,
        reason: String,
    },

    #[error("Invalid schema reference '{0}': expected 'name/version'")]
    InvalidReference(String),
}

/// A message's content did not conform to its declared schema.
#[derive(Error, Debug)]
#[error("Content does not conform to schema '{schema}': {}", .violations.join("; "))]
pub struct SchemaValidationError {
    pub schema: String,
    pub violations: Vec<String>,
}

/// Errors raised by connectors and processors during artifact execution.
///
/// The executor treats these uniformly: the artifact is marked failed and
/// its descendants are skipped (or continue, for optional artifacts).
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Invalid component configuration: {0}")]
    Config(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    #[error("Required input is missing: {0}")]
    MissingInput(String),

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },
}
