//! Content-addressed per-run persistence for artifacts, LLM cache entries,
//! execution state, and batch jobs.
//!
//! Every document is keyed by `(run_id, key)` where `key` is a
//! slash-delimited logical path (`artifacts/findings`, `_system/state`).
//! Two backends implement the same semantic contract: [`InMemoryStore`]
//! for tests and single-process use, and [`FilesystemStore`] mapping keys
//! to `{base}/runs/{run_id}/{key}.json`.

mod error;
mod filesystem;
mod memory;
mod metadata;

use async_trait::async_trait;
use serde_json::Value;

use wct_core::Message;

pub use error::StoreError;
pub use filesystem::FilesystemStore;
pub use memory::InMemoryStore;
pub use metadata::{RunMetadata, RunStatus};

/// Reserved key prefix for run-level system documents (state, metadata).
/// Excluded from `list_keys` and preserved by `clear`.
pub const SYSTEM_PREFIX: &str = "_system";

/// Key of the persisted execution state document.
pub const STATE_KEY: &str = "_system/state";

/// Key of the run metadata document.
pub const METADATA_KEY: &str = "_system/metadata";

/// Prefix under which LLM cache entries live.
pub const CACHE_PREFIX: &str = "cache";

/// Reject keys that could escape the run directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".to_string(),
        });
    }
    if key.starts_with('/') {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "absolute paths are not allowed".to_string(),
        });
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: "path traversal segments (..) are not allowed".to_string(),
        });
    }
    Ok(())
}

/// Asynchronous per-run document store.
///
/// Backends implement the raw document operations; message persistence,
/// execution-state persistence, and the LLM cache view are provided on top
/// of them. Concurrent saves to distinct keys are safe; concurrent saves of
/// the same key are last-writer-wins (the executor holds exclusive
/// responsibility per artifact id, so this never occurs in practice).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upsert a raw JSON document. Creates intermediate containers.
    async fn save_raw(&self, run_id: &str, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Fetch a raw JSON document, or `None` if absent.
    async fn get_raw(&self, run_id: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Whether a document exists at this key. Pure observation.
    async fn exists(&self, run_id: &str, key: &str) -> Result<bool, StoreError>;

    /// Delete the document at this key. No-op if absent.
    async fn delete(&self, run_id: &str, key: &str) -> Result<(), StoreError>;

    /// List keys for a run, optionally filtered by prefix. Keys under the
    /// reserved `_system/` prefix are never returned.
    async fn list_keys(&self, run_id: &str, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Remove every document for a run except those under `_system/`.
    async fn clear(&self, run_id: &str) -> Result<(), StoreError>;

    /// List known runs, most recent first, optionally filtered by status.
    async fn list_runs(
        &self,
        status_filter: Option<RunStatus>,
    ) -> Result<Vec<RunMetadata>, StoreError>;

    // ------------------------------------------------------------------
    // Message persistence
    // ------------------------------------------------------------------

    /// Persist a message artifact.
    async fn save(&self, run_id: &str, key: &str, message: &Message) -> Result<(), StoreError> {
        let value = serde_json::to_value(message)?;
        self.save_raw(run_id, key, &value).await
    }

    /// Load a message artifact, failing if it is absent.
    async fn get(&self, run_id: &str, key: &str) -> Result<Message, StoreError> {
        let value = self.get_raw(run_id, key).await?.ok_or_else(|| {
            StoreError::ArtifactNotFound {
                run_id: run_id.to_string(),
                key: key.to_string(),
            }
        })?;
        serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Execution state and run metadata
    // ------------------------------------------------------------------

    async fn save_execution_state(&self, run_id: &str, state: &Value) -> Result<(), StoreError> {
        self.save_raw(run_id, STATE_KEY, state).await
    }

    async fn load_execution_state(&self, run_id: &str) -> Result<Option<Value>, StoreError> {
        self.get_raw(run_id, STATE_KEY).await
    }

    async fn save_run_metadata(
        &self,
        run_id: &str,
        metadata: &RunMetadata,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(metadata)?;
        self.save_raw(run_id, METADATA_KEY, &value).await
    }

    async fn load_run_metadata(&self, run_id: &str) -> Result<Option<RunMetadata>, StoreError> {
        match self.get_raw(run_id, METADATA_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_value(value).map_err(|e| {
                StoreError::Corrupt {
                    key: METADATA_KEY.to_string(),
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // LLM cache view
    //
    // The cache is oblivious to delivery mode: sync and batch providers
    // share the same key shape, and only the entry's status field
    // distinguishes them.
    // ------------------------------------------------------------------

    async fn cache_get(&self, run_id: &str, cache_key: &str) -> Result<Option<Value>, StoreError> {
        self.get_raw(run_id, &format!("{CACHE_PREFIX}/{cache_key}"))
            .await
    }

    async fn cache_set(
        &self,
        run_id: &str,
        cache_key: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        self.save_raw(run_id, &format!("{CACHE_PREFIX}/{cache_key}"), value)
            .await
    }

    /// Remove every cache entry for the run. Called once a run completes
    /// successfully.
    async fn cache_clear(&self, run_id: &str) -> Result<(), StoreError> {
        for key in self.list_keys(run_id, CACHE_PREFIX).await? {
            self.delete(run_id, &key).await?;
        }
        Ok(())
    }
}

pub(crate) fn sort_runs(
    mut runs: Vec<RunMetadata>,
    status_filter: Option<RunStatus>,
) -> Vec<RunMetadata> {
    if let Some(status) = status_filter {
        runs.retain(|r| r.status == status);
    }
    runs.sort_by(|a, b| b.start_timestamp.cmp(&a.start_timestamp));
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation_rejects_traversal_and_absolute() {
        assert!(validate_key("artifacts/findings").is_ok());
        assert!(validate_key("cache/abc123").is_ok());
        assert!(validate_key("_system/state").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("artifacts/../../escape").is_err());
    }

    #[test]
    fn dotdot_inside_a_segment_is_allowed() {
        // Only whole `..` segments are traversal; names containing dots are not.
        assert!(validate_key("artifacts/my..file").is_ok());
    }
}
