//! Analyser configuration parsed from runbook `properties`.

use serde::Deserialize;
use serde_json::{Map, Value};

use wct_core::ComponentError;
use wct_llm::BatchingMode;
use wct_matching::{ContextSize, MatchOptions};

/// Common configuration shared by the pattern analysers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnalyserConfig {
    /// Ruleset URI override (`provider/name/version`).
    pub ruleset: Option<String>,
    /// Maximum unique evidence snippets per finding.
    pub max_evidence: usize,
    /// Evidence context size: `small`, `medium`, `large`, or `full`.
    pub evidence_context_size: String,
    pub llm_validation: LlmValidationConfig,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            ruleset: None,
            max_evidence: 3,
            evidence_context_size: "small".to_string(),
            llm_validation: LlmValidationConfig::default(),
        }
    }
}

impl AnalyserConfig {
    /// Parse and validate the `properties` map. Unknown keys are rejected.
    pub fn from_properties(properties: &Map<String, Value>) -> Result<Self, ComponentError> {
        serde_json::from_value(Value::Object(properties.clone()))
            .map_err(|e| ComponentError::Config(e.to_string()))
    }

    #[must_use]
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            max_evidence: self.max_evidence,
            context_size: ContextSize::from_config(&self.evidence_context_size),
            ..MatchOptions::default()
        }
    }
}

/// LLM validation tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LlmValidationConfig {
    pub enabled: bool,
    pub batching_mode: BatchingModeConfig,
    /// Findings sampled per source group for validation.
    pub sample_size: usize,
}

impl Default for LlmValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batching_mode: BatchingModeConfig::CountBased,
            sample_size: 5,
        }
    }
}

/// Serde-friendly batching mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchingModeConfig {
    #[default]
    CountBased,
    ExtendedContext,
}

impl From<BatchingModeConfig> for BatchingMode {
    fn from(config: BatchingModeConfig) -> Self {
        match config {
            BatchingModeConfig::CountBased => Self::CountBased,
            BatchingModeConfig::ExtendedContext => Self::ExtendedContext,
        }
    }
}
