//! Execution state tracking and persistence.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wct_store::ArtifactStore;

use crate::error::ExecutionError;

/// Tracks which artifacts of a run have completed, failed, or were skipped.
///
/// Every artifact is in exactly one of the four sets. Transitions are
/// one-way out of `not_started`; marking an artifact twice is a no-op, so
/// the sets never pollute each other. Persisted to the store after every
/// change to support resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub run_id: String,
    pub completed: BTreeSet<String>,
    pub not_started: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
    pub last_checkpoint: DateTime<Utc>,
}

impl ExecutionState {
    /// Initial state with every artifact pending.
    #[must_use]
    pub fn fresh(run_id: &str, artifact_ids: BTreeSet<String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            completed: BTreeSet::new(),
            not_started: artifact_ids,
            failed: BTreeSet::new(),
            skipped: BTreeSet::new(),
            last_checkpoint: Utc::now(),
        }
    }

    pub fn mark_completed(&mut self, artifact_id: &str) {
        if self.not_started.remove(artifact_id) {
            self.completed.insert(artifact_id.to_string());
            self.last_checkpoint = Utc::now();
        }
    }

    pub fn mark_failed(&mut self, artifact_id: &str) {
        if self.not_started.remove(artifact_id) {
            self.failed.insert(artifact_id.to_string());
            self.last_checkpoint = Utc::now();
        }
    }

    pub fn mark_skipped(&mut self, artifact_ids: &BTreeSet<String>) {
        let to_skip: BTreeSet<String> = artifact_ids
            .intersection(&self.not_started)
            .cloned()
            .collect();
        if !to_skip.is_empty() {
            for id in &to_skip {
                self.not_started.remove(id);
            }
            self.skipped.extend(to_skip);
            self.last_checkpoint = Utc::now();
        }
    }

    /// Return failed and skipped artifacts to `not_started` so a resumed
    /// run retries them. Completed artifacts stay completed.
    pub fn reset_for_resume(&mut self) {
        self.not_started.extend(std::mem::take(&mut self.failed));
        self.not_started.extend(std::mem::take(&mut self.skipped));
        self.last_checkpoint = Utc::now();
    }

    /// The four sets must partition exactly this id set.
    #[must_use]
    pub fn tracked_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.extend(self.completed.iter().cloned());
        ids.extend(self.not_started.iter().cloned());
        ids.extend(self.failed.iter().cloned());
        ids.extend(self.skipped.iter().cloned());
        ids
    }

    pub async fn save(&mut self, store: &dyn ArtifactStore) -> Result<(), ExecutionError> {
        self.last_checkpoint = Utc::now();
        let value = serde_json::to_value(&*self).map_err(wct_store::StoreError::from)?;
        store.save_execution_state(&self.run_id, &value).await?;
        Ok(())
    }

    pub async fn load(store: &dyn ArtifactStore, run_id: &str) -> Result<Self, ExecutionError> {
        let value = store
            .load_execution_state(run_id)
            .await?
            .ok_or_else(|| ExecutionError::StateNotFound {
                run_id: run_id.to_string(),
            })?;
        serde_json::from_value(value).map_err(|e| {
            ExecutionError::Store(wct_store::StoreError::Corrupt {
                key: wct_store::STATE_KEY.to_string(),
                reason: e.to_string(),
            })
        })
    }
}
