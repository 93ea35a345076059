//! Finding value types shared by all analysers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Risk assessment level carried by rules and findings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A text snippet surrounding a pattern match, with its collection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub content: String,
    pub collection_timestamp: DateTime<Utc>,
}

impl Evidence {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            collection_timestamp: Utc::now(),
        }
    }
}

/// A pattern that matched, with how many times it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPattern {
    pub pattern: String,
    pub match_count: usize,
}

/// Provenance metadata attached to every finding.
///
/// `source` identifies where the data was found (file path, table name);
/// `context` carries extensible pipeline metadata such as the connector
/// type or artifact id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl FindingMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            context: Map::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}
