//! In-memory store backend for tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::metadata::{RunMetadata, RunStatus};
use crate::{ArtifactStore, METADATA_KEY, SYSTEM_PREFIX, StoreError, sort_runs, validate_key};

/// Store backend holding every document in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    runs: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn save_raw(&self, run_id: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut runs = self.runs.write().await;
        runs.entry(run_id.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get_raw(&self, run_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        validate_key(key)?;
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).and_then(|docs| docs.get(key)).cloned())
    }

    async fn exists(&self, run_id: &str, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).is_some_and(|docs| docs.contains_key(key)))
    }

    async fn delete(&self, run_id: &str, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut runs = self.runs.write().await;
        if let Some(docs) = runs.get_mut(run_id) {
            docs.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self, run_id: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let runs = self.runs.read().await;
        let mut keys: Vec<String> = runs
            .get(run_id)
            .map(|docs| {
                docs.keys()
                    .filter(|k| !k.starts_with(SYSTEM_PREFIX))
                    .filter(|k| prefix.is_empty() || k.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self, run_id: &str) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        if let Some(docs) = runs.get_mut(run_id) {
            docs.retain(|key, _| key.starts_with(SYSTEM_PREFIX));
        }
        Ok(())
    }

    async fn list_runs(
        &self,
        status_filter: Option<RunStatus>,
    ) -> Result<Vec<RunMetadata>, StoreError> {
        let runs = self.runs.read().await;
        let mut collected = Vec::new();
        for docs in runs.values() {
            if let Some(value) = docs.get(METADATA_KEY)
                && let Ok(metadata) = serde_json::from_value::<RunMetadata>(value.clone())
            {
                collected.push(metadata);
            }
        }
        Ok(sort_runs(collected, status_filter))
    }
}
