//! Run metadata persisted under `_system/metadata`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Paused,
}

/// Descriptive record of a run, written when the run starts and updated as
/// it transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub runbook_path: String,
    /// BLAKE3 hex digest of the runbook file contents at plan time. Resume
    /// rejects a run whose runbook no longer hashes to this value.
    pub runbook_hash: String,
    pub start_timestamp: DateTime<Utc>,
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Paused).unwrap(),
            "\"paused\""
        );
        let parsed: RunStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, RunStatus::Completed);
    }

    #[test]
    fn metadata_round_trips() {
        let metadata = RunMetadata {
            run_id: "run-1".to_string(),
            runbook_path: "runbooks/audit.yaml".to_string(),
            runbook_hash: "abc123".to_string(),
            start_timestamp: Utc::now(),
            status: RunStatus::Running,
        };

        let json = serde_json::to_value(&metadata).unwrap();
        let restored: RunMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(restored, metadata);
    }
}
