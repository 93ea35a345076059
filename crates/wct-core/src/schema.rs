//! Schema descriptors and the embedded JSON Schema registry.
//!
//! A [`Schema`] is a lightweight `(name, version)` descriptor. The JSON
//! Schema definition is bundled with the crate and compiled lazily on first
//! use; compiled validators are cached process-wide so repeated message
//! validation does not re-parse schema documents.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

/// Bundled JSON Schema definitions, keyed by `(name, version)`.
static BUNDLED_SCHEMAS: &[((&str, &str), &str)] = &[
    (
        ("standard_input", "1.0.0"),
        include_str!("../schemas/standard_input_1.0.0.json"),
    ),
    (
        ("personal_data_finding", "1.0.0"),
        include_str!("../schemas/personal_data_finding_1.0.0.json"),
    ),
    (
        ("data_subject_finding", "1.0.0"),
        include_str!("../schemas/data_subject_finding_1.0.0.json"),
    ),
    (
        ("processing_purpose_finding", "1.0.0"),
        include_str!("../schemas/processing_purpose_finding_1.0.0.json"),
    ),
];

/// Process-wide cache of compiled validators.
static VALIDATOR_CACHE: Lazy<RwLock<HashMap<(String, String), Arc<jsonschema::Validator>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Schema descriptor identifying a message shape by `(name, version)`.
///
/// Two schemas are equal iff their name and version are equal; the JSON
/// definition is registry state, not identity. Two schemas with the same
/// identity but different definitions would indicate a registry error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    version: String,
}

impl Schema {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse a `name/version` reference as used by runbook `output_schema`
    /// overrides and child runbook input declarations.
    pub fn parse(reference: &str) -> Result<Self, SchemaError> {
        match reference.split('/').collect::<Vec<_>>().as_slice() {
            [name, version] if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(*name, *version))
            }
            _ => Err(SchemaError::InvalidReference(reference.to_string())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `name/version` form used in runbooks and log output.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    /// Load the JSON Schema definition from the bundled registry.
    pub fn definition(&self) -> Result<Value, SchemaError> {
        let raw = BUNDLED_SCHEMAS
            .iter()
            .find(|((name, version), _)| *name == self.name && *version == self.version)
            .map(|(_, raw)| *raw)
            .ok_or_else(|| SchemaError::Unknown {
                name: self.name.clone(),
                version: self.version.clone(),
            })?;

        serde_json::from_str(raw).map_err(|e| SchemaError::Compile {
            name: self.name.clone(),
            version: self.version.clone(),
            reason: e.to_string(),
        })
    }

    /// Get a compiled validator for this schema, compiling and caching on
    /// first use.
    pub fn validator(&self) -> Result<Arc<jsonschema::Validator>, SchemaError> {
        let key = (self.name.clone(), self.version.clone());

        if let Some(validator) = VALIDATOR_CACHE
            .read()
            .expect("validator cache poisoned")
            .get(&key)
        {
            return Ok(Arc::clone(validator));
        }

        let definition = self.definition()?;
        let validator =
            jsonschema::validator_for(&definition).map_err(|e| SchemaError::Compile {
                name: self.name.clone(),
                version: self.version.clone(),
                reason: e.to_string(),
            })?;
        let validator = Arc::new(validator);

        VALIDATOR_CACHE
            .write()
            .expect("validator cache poisoned")
            .insert(key, Arc::clone(&validator));

        Ok(validator)
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_on_name_and_version() {
        let a = Schema::new("standard_input", "1.0.0");
        let b = Schema::new("standard_input", "1.0.0");
        let c = Schema::new("standard_input", "2.0.0");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn parse_accepts_name_version_reference() {
        let schema = Schema::parse("personal_data_finding/1.0.0").unwrap();
        assert_eq!(schema.name(), "personal_data_finding");
        assert_eq!(schema.version(), "1.0.0");
    }

    #[test]
    fn parse_rejects_malformed_references() {
        assert!(Schema::parse("no-version").is_err());
        assert!(Schema::parse("a/b/c").is_err());
        assert!(Schema::parse("/1.0.0").is_err());
    }

    #[test]
    fn bundled_schemas_resolve_and_compile() {
        for ((name, version), _) in BUNDLED_SCHEMAS {
            let schema = Schema::new(*name, *version);
            schema.definition().unwrap();
            schema.validator().unwrap();
        }
    }

    #[test]
    fn unknown_schema_fails_resolution() {
        let schema = Schema::new("nonexistent", "9.9.9");
        assert!(matches!(
            schema.definition(),
            Err(SchemaError::Unknown { .. })
        ));
    }

    #[test]
    fn serde_round_trip_preserves_identity() {
        let schema = Schema::new("standard_input", "1.0.0");
        let json = serde_json::to_string(&schema).unwrap();
        let restored: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, restored);
    }
}
