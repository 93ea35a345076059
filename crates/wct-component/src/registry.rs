//! Name-based component registry.

use std::collections::HashMap;
use std::sync::Arc;

use wct_core::ComponentError;

use crate::factory::{ConnectorFactory, ProcessorFactory};

/// Maps component `type` strings to factories.
///
/// Built once at startup by registering every available connector and
/// processor; the planner and executor only read from it afterwards.
#[derive(Default)]
pub struct ComponentRegistry {
    connectors: HashMap<String, Arc<dyn ConnectorFactory>>,
    processors: HashMap<String, Arc<dyn ProcessorFactory>>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_connector(
        &mut self,
        factory: Arc<dyn ConnectorFactory>,
    ) -> Result<(), ComponentError> {
        let name = factory.component_name().to_string();
        if self.connectors.contains_key(&name) {
            return Err(ComponentError::Config(format!(
                "connector type '{name}' is already registered"
            )));
        }
        self.connectors.insert(name, factory);
        Ok(())
    }

    pub fn register_processor(
        &mut self,
        factory: Arc<dyn ProcessorFactory>,
    ) -> Result<(), ComponentError> {
        let name = factory.component_name().to_string();
        if self.processors.contains_key(&name) {
            return Err(ComponentError::Config(format!(
                "processor type '{name}' is already registered"
            )));
        }
        self.processors.insert(name, factory);
        Ok(())
    }

    #[must_use]
    pub fn connector(&self, name: &str) -> Option<Arc<dyn ConnectorFactory>> {
        self.connectors.get(name).cloned()
    }

    #[must_use]
    pub fn processor(&self, name: &str) -> Option<Arc<dyn ProcessorFactory>> {
        self.processors.get(name).cloned()
    }

    /// Registered connector type names, sorted for stable listings.
    #[must_use]
    pub fn connector_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connectors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered processor type names, sorted for stable listings.
    #[must_use]
    pub fn processor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }
}
