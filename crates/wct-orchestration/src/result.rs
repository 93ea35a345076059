//! Run and per-artifact outcome records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wct_core::Message;

/// Outcome of executing a single artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactResult {
    pub artifact_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_seconds: f64,
    /// `parent`, or `child:{runbook_name}` for artifacts inlined from a
    /// child runbook.
    pub origin: String,
    /// For alias artifacts, the child artifact id this result mirrors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ArtifactResult {
    #[must_use]
    pub fn succeeded(artifact_id: &str, message: Message, duration_seconds: f64) -> Self {
        Self {
            artifact_id: artifact_id.to_string(),
            success: true,
            message: Some(message),
            error: None,
            duration_seconds,
            origin: "parent".to_string(),
            alias: None,
        }
    }

    #[must_use]
    pub fn failed(artifact_id: &str, error: String, duration_seconds: f64) -> Self {
        Self {
            artifact_id: artifact_id.to_string(),
            success: false,
            message: None,
            error: Some(error),
            duration_seconds,
            origin: "parent".to_string(),
            alias: None,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

/// Final outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: String,
    pub start_timestamp: DateTime<Utc>,
    pub artifacts: BTreeMap<String, ArtifactResult>,
    pub skipped: BTreeSet<String>,
    /// True when LLM batches were submitted and the run paused; resume
    /// after polling the batches to completion.
    pub pending: bool,
    pub total_duration_seconds: f64,
}

impl ExecutionResult {
    /// A run succeeds when nothing failed, nothing was skipped, and no
    /// batches are pending.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.pending
            && self.skipped.is_empty()
            && self.artifacts.values().all(|result| result.success)
    }
}
