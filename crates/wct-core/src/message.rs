//! The typed data payload exchanged between components.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaValidationError;
use crate::schema::Schema;

/// A typed, immutable payload produced by one component and consumed by
/// another.
///
/// The content is a JSON document shaped by the message's schema. Messages
/// must validate against their schema before crossing a component boundary;
/// the executor enforces this before persisting an artifact. Fields are
/// private so a constructed message cannot be mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: String,
    content: Value,
    schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, content: Value, schema: Schema) -> Self {
        Self {
            id: id.into(),
            content,
            schema,
            run_id: None,
        }
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn content(&self) -> &Value {
        &self.content
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Validate the content against the declared schema.
    ///
    /// Collects every violation rather than stopping at the first, so a
    /// component author sees the full shape mismatch in one error.
    pub fn validate(&self) -> Result<(), SchemaValidationError> {
        let validator = self
            .schema
            .validator()
            .map_err(|e| SchemaValidationError {
                schema: self.schema.reference(),
                violations: vec![e.to_string()],
            })?;

        let violations: Vec<String> = validator
            .iter_errors(&self.content)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError {
                schema: self.schema.reference(),
                violations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn standard_input_content() -> Value {
        json!({
            "schemaVersion": "1.0.0",
            "name": "fixture",
            "data": [
                {
                    "content": "user@example.com logged in",
                    "metadata": { "source": "fixture.txt", "connector_type": "filesystem" }
                }
            ]
        })
    }

    #[test]
    fn valid_content_passes_validation() {
        let message = Message::new(
            "msg-1",
            standard_input_content(),
            Schema::new("standard_input", "1.0.0"),
        );

        message.validate().unwrap();
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let message = Message::new(
            "msg-1",
            json!({ "schemaVersion": "1.0.0", "name": "fixture" }),
            Schema::new("standard_input", "1.0.0"),
        );

        let err = message.validate().unwrap_err();
        assert!(err.to_string().contains("standard_input"));
        assert!(!err.violations.is_empty());
    }

    #[test]
    fn wrong_item_shape_fails_validation() {
        let message = Message::new(
            "msg-1",
            json!({
                "schemaVersion": "1.0.0",
                "name": "fixture",
                "data": [{ "content": 42 }]
            }),
            Schema::new("standard_input", "1.0.0"),
        );

        assert!(message.validate().is_err());
    }

    #[test]
    fn serde_round_trip_preserves_message() {
        let message = Message::new(
            "msg-1",
            standard_input_content(),
            Schema::new("standard_input", "1.0.0"),
        )
        .with_run_id("run-42");

        let json = serde_json::to_value(&message).unwrap();
        let restored: Message = serde_json::from_value(json).unwrap();

        assert_eq!(restored.id(), "msg-1");
        assert_eq!(restored.run_id(), Some("run-42"));
        assert_eq!(restored.schema(), message.schema());
        assert_eq!(restored.content(), message.content());
    }
}
