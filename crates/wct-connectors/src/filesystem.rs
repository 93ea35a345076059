//! Filesystem connector: reads a file or directory into standard input
//! data items.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use wct_component::{ConnectorFactory, ServiceContainer, reject_unknown_keys};
use wct_core::{ComponentError, Connector, Message, Schema};

/// Files larger than this are skipped rather than loaded into memory.
const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

const ALLOWED_PROPERTIES: &[&str] = &["path", "include", "max_file_size"];

/// Factory for [`FilesystemConnector`].
pub struct FilesystemConnectorFactory;

impl ConnectorFactory for FilesystemConnectorFactory {
    fn component_name(&self) -> &str {
        "filesystem"
    }

    fn output_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("standard_input", "1.0.0")]
    }

    fn can_create(&self, properties: &Map<String, Value>) -> bool {
        FilesystemConnector::from_properties(properties).is_ok()
    }

    fn create(
        &self,
        properties: &Map<String, Value>,
        _services: &ServiceContainer,
    ) -> Result<Box<dyn Connector>, ComponentError> {
        Ok(Box::new(FilesystemConnector::from_properties(properties)?))
    }
}

/// Reads one file, or every matching file under a directory, into data
/// items carrying the file path as their source.
pub struct FilesystemConnector {
    path: PathBuf,
    include: Option<GlobSet>,
    max_file_size: u64,
}

impl FilesystemConnector {
    fn from_properties(properties: &Map<String, Value>) -> Result<Self, ComponentError> {
        reject_unknown_keys(properties, ALLOWED_PROPERTIES)?;

        let path = properties
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::Config("'path' is required and must be a string".to_string())
            })?;

        let include = match properties.get("include") {
            None => None,
            Some(Value::String(pattern)) => {
                let glob = Glob::new(pattern).map_err(|e| {
                    ComponentError::Config(format!("invalid 'include' pattern '{pattern}': {e}"))
                })?;
                let mut builder = GlobSetBuilder::new();
                builder.add(glob);
                Some(builder.build().map_err(|e| {
                    ComponentError::Config(format!("invalid 'include' pattern '{pattern}': {e}"))
                })?)
            }
            Some(_) => {
                return Err(ComponentError::Config(
                    "'include' must be a glob string".to_string(),
                ));
            }
        };

        let max_file_size = match properties.get("max_file_size") {
            None => DEFAULT_MAX_FILE_SIZE,
            Some(value) => value.as_u64().ok_or_else(|| {
                ComponentError::Config("'max_file_size' must be a positive integer".to_string())
            })?,
        };

        Ok(Self {
            path: PathBuf::from(path),
            include,
            max_file_size,
        })
    }

    /// Collect candidate files: the path itself, or a sorted recursive
    /// listing of the directory filtered by the include pattern.
    async fn candidate_files(&self) -> Result<Vec<PathBuf>, ComponentError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            ComponentError::Extraction(format!(
                "cannot access path '{}': {e}",
                self.path.display()
            ))
        })?;

        if metadata.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                ComponentError::Extraction(format!("cannot read directory '{}': {e}", dir.display()))
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                ComponentError::Extraction(format!("cannot read directory '{}': {e}", dir.display()))
            })? {
                let entry_path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    ComponentError::Extraction(format!(
                        "cannot stat '{}': {e}",
                        entry_path.display()
                    ))
                })?;
                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if file_type.is_file() && self.matches_include(&entry_path) {
                    files.push(entry_path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn matches_include(&self, file: &Path) -> bool {
        match &self.include {
            None => true,
            Some(include) => {
                let relative = file.strip_prefix(&self.path).unwrap_or(file);
                include.is_match(relative)
            }
        }
    }
}

#[async_trait]
impl Connector for FilesystemConnector {
    async fn extract(&self, output_schema: &Schema) -> Result<Message, ComponentError> {
        let files = self.candidate_files().await?;
        let mut data = Vec::new();

        for file in files {
            let metadata = tokio::fs::metadata(&file).await.map_err(|e| {
                ComponentError::Extraction(format!("cannot stat '{}': {e}", file.display()))
            })?;
            if metadata.len() > self.max_file_size {
                warn!(
                    file = %file.display(),
                    size = metadata.len(),
                    limit = self.max_file_size,
                    "Skipping oversized file"
                );
                continue;
            }

            let content = match tokio::fs::read_to_string(&file).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            data.push(json!({
                "content": content,
                "metadata": {
                    "source": file.display().to_string(),
                    "connector_type": "filesystem",
                }
            }));
        }

        debug!(
            path = %self.path.display(),
            items = data.len(),
            "Filesystem extraction complete"
        );

        let content = json!({
            "schemaVersion": output_schema.version(),
            "name": "filesystem",
            "data": data,
        });

        Ok(Message::new(
            format!("filesystem:{}", self.path.display()),
            content,
            output_schema.clone(),
        ))
    }
}
