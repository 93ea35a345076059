//! Batch submission records and provider batch types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use wct_store::{ArtifactStore, StoreError};

/// One prompt inside a batch submission. `custom_id` is the cache key the
/// result maps back to; `response_schema` lets the provider reproduce the
/// structured-output instruction it would use on the synchronous path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub custom_id: String,
    pub prompt: String,
    pub model: String,
    pub response_schema: Value,
}

/// Provider confirmation of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSubmission {
    pub batch_id: String,
    pub request_count: usize,
}

/// Lifecycle state of a batch at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatchState {
    Submitted,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl BatchState {
    /// Whether the provider may still be working on the batch.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitted | Self::InProgress)
    }
}

/// Snapshot of a batch's processing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatus {
    pub batch_id: String,
    pub state: BatchState,
}

/// Per-prompt result of a completed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub custom_id: String,
    pub succeeded: bool,
    pub response: Option<Value>,
}

/// Persistent record of one batch submission, stored under
/// `batch_jobs/{batch_id}` for the run that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: String,
    pub provider: String,
    pub model: String,
    pub cache_keys: Vec<String>,
    pub status: BatchState,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    #[must_use]
    pub fn new(batch_id: &str, provider: &str, model: &str, cache_keys: Vec<String>) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            cache_keys,
            status: BatchState::Submitted,
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    #[must_use]
    pub fn storage_key(batch_id: &str) -> String {
        format!("batch_jobs/{batch_id}")
    }

    pub async fn save(&self, store: &dyn ArtifactStore, run_id: &str) -> Result<(), StoreError> {
        let value = serde_json::to_value(self)?;
        store
            .save_raw(run_id, &Self::storage_key(&self.batch_id), &value)
            .await
    }

    /// Load every batch job persisted for a run.
    pub async fn list_for_run(
        store: &dyn ArtifactStore,
        run_id: &str,
    ) -> Result<Vec<Self>, StoreError> {
        let mut jobs = Vec::new();
        for key in store.list_keys(run_id, "batch_jobs/").await? {
            if let Some(value) = store.get_raw(run_id, &key).await? {
                let job = serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
                jobs.push(job);
            }
        }
        jobs.sort_by(|a: &Self, b: &Self| a.submitted_at.cmp(&b.submitted_at));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wct_store::InMemoryStore;

    #[tokio::test]
    async fn jobs_persist_and_list_in_submission_order() {
        let store = InMemoryStore::new();

        let first = BatchJob::new("batch-a", "anthropic", "model-x", vec!["k1".into()]);
        let mut second = BatchJob::new("batch-b", "anthropic", "model-x", vec!["k2".into()]);
        second.submitted_at = first.submitted_at + chrono::Duration::seconds(1);

        second.save(&store, "run-1").await.unwrap();
        first.save(&store, "run-1").await.unwrap();

        let jobs = BatchJob::list_for_run(&store, "run-1").await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].batch_id, "batch-a");
        assert_eq!(jobs[1].batch_id, "batch-b");
    }

    #[tokio::test]
    async fn list_is_empty_for_unknown_run() {
        let store = InMemoryStore::new();
        let jobs = BatchJob::list_for_run(&store, "nope").await.unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn active_states() {
        assert!(BatchState::Submitted.is_active());
        assert!(BatchState::InProgress.is_active());
        assert!(!BatchState::Completed.is_active());
        assert!(!BatchState::Failed.is_active());
        assert!(!BatchState::Cancelled.is_active());
        assert!(!BatchState::Expired.is_active());
    }

    #[test]
    fn state_serialises_snake_case() {
        assert_eq!(
            serde_json::to_string(&BatchState::InProgress).unwrap(),
            "\"in_progress\""
        );
    }
}
