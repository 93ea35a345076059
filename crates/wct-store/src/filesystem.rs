//! Filesystem store backend.
//!
//! Maps `(run_id, key)` to `{base}/runs/{run_id}/{key}.json`. Hierarchical
//! keys become nested directories. Key validation (no `..` segments, no
//! absolute paths) happens before any path is built, so documents cannot
//! escape the run directory.

use std::collections::HashMap;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::warn;

use crate::metadata::{RunMetadata, RunStatus};
use crate::{ArtifactStore, SYSTEM_PREFIX, StoreError, sort_runs, validate_key};

/// Store backend persisting each document as a pretty-printed JSON file.
pub struct FilesystemStore {
    base_path: Utf8PathBuf,
}

impl FilesystemStore {
    pub fn new(base_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &Utf8Path {
        &self.base_path
    }

    fn run_dir(&self, run_id: &str) -> Utf8PathBuf {
        self.base_path.join("runs").join(run_id)
    }

    fn key_path(&self, run_id: &str, key: &str) -> Result<Utf8PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.run_dir(run_id).join(format!("{key}.json")))
    }

    /// Collect every `key → path` pair under a run directory. Keys are the
    /// relative path without the `.json` suffix.
    fn collect_keys(run_dir: &Utf8Path) -> Result<HashMap<String, Utf8PathBuf>, StoreError> {
        let mut keys = HashMap::new();
        if !run_dir.exists() {
            return Ok(keys);
        }

        let mut pending = vec![run_dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in dir.read_dir_utf8()? {
                let entry = entry?;
                let path = entry.path().to_path_buf();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                } else if path.extension() == Some("json")
                    && let Ok(relative) = path.strip_prefix(run_dir)
                {
                    let key = relative.as_str().trim_end_matches(".json").to_string();
                    keys.insert(key, path);
                }
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    async fn save_raw(&self, run_id: &str, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.key_path(run_id, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn get_raw(&self, run_id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.key_path(run_id, key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let value = serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, run_id: &str, key: &str) -> Result<bool, StoreError> {
        let path = self.key_path(run_id, key)?;
        Ok(path.exists())
    }

    async fn delete(&self, run_id: &str, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(run_id, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, run_id: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let run_dir = self.run_dir(run_id);
        let mut keys: Vec<String> = Self::collect_keys(&run_dir)?
            .into_keys()
            .filter(|k| !k.starts_with(SYSTEM_PREFIX))
            .filter(|k| prefix.is_empty() || k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self, run_id: &str) -> Result<(), StoreError> {
        let run_dir = self.run_dir(run_id);
        for (key, path) in Self::collect_keys(&run_dir)? {
            if key.starts_with(SYSTEM_PREFIX) {
                continue;
            }
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn list_runs(
        &self,
        status_filter: Option<RunStatus>,
    ) -> Result<Vec<RunMetadata>, StoreError> {
        let runs_dir = self.base_path.join("runs");
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut collected = Vec::new();
        for entry in runs_dir.read_dir_utf8()? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string();
            match self.load_run_metadata(&run_id).await {
                Ok(Some(metadata)) => collected.push(metadata),
                Ok(None) => {}
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "Skipping run with unreadable metadata");
                }
            }
        }
        Ok(sort_runs(collected, status_filter))
    }
}
