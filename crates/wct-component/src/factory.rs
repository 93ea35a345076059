//! Factory traits for connectors and processors.

use serde_json::{Map, Value};

use wct_core::{ComponentError, Connector, Processor, Schema};

use crate::container::ServiceContainer;

/// Builds connectors from runbook `source` configurations.
pub trait ConnectorFactory: Send + Sync {
    /// The `type` string this factory answers to.
    fn component_name(&self) -> &str;

    /// Schemas this connector can produce; the first is the default.
    fn output_schemas(&self) -> Vec<Schema>;

    /// Whether the properties map is a valid configuration.
    fn can_create(&self, properties: &Map<String, Value>) -> bool;

    /// Build a connector, injecting services from the container.
    fn create(
        &self,
        properties: &Map<String, Value>,
        services: &ServiceContainer,
    ) -> Result<Box<dyn Connector>, ComponentError>;
}

/// Builds processors (analysers and classifiers) from runbook `process`
/// configurations.
pub trait ProcessorFactory: Send + Sync {
    fn component_name(&self) -> &str;

    /// Schemas this processor accepts as input.
    fn input_schemas(&self) -> Vec<Schema>;

    /// Schemas this processor can produce; the first is the default.
    fn output_schemas(&self) -> Vec<Schema>;

    fn can_create(&self, properties: &Map<String, Value>) -> bool;

    fn create(
        &self,
        properties: &Map<String, Value>,
        services: &ServiceContainer,
    ) -> Result<Box<dyn Processor>, ComponentError>;
}

/// Fail configuration validation when the properties map carries keys the
/// component does not understand.
pub fn reject_unknown_keys(
    properties: &Map<String, Value>,
    allowed: &[&str],
) -> Result<(), ComponentError> {
    let unknown: Vec<&str> = properties
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ComponentError::Config(format!(
            "unknown propert{} {}; allowed: {}",
            if unknown.len() == 1 { "y" } else { "ies" },
            unknown.join(", "),
            allowed.join(", ")
        )))
    }
}
