//! Service container for dependency injection into components.

use std::sync::Arc;

use wct_llm::LlmService;
use wct_store::ArtifactStore;

/// Holds the shared services components may depend on.
///
/// The artifact store is a singleton for the whole run. The LLM service is
/// optional: when no provider is configured the slot is empty and
/// components degrade gracefully (analysers skip LLM validation).
/// Components themselves are transient - factories build a fresh instance
/// per artifact.
#[derive(Clone)]
pub struct ServiceContainer {
    store: Arc<dyn ArtifactStore>,
    llm: Option<Arc<LlmService>>,
}

impl ServiceContainer {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store, llm: None }
    }

    #[must_use]
    pub fn with_llm(mut self, llm: Arc<LlmService>) -> Self {
        self.llm = Some(llm);
        self
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.store)
    }

    /// The LLM service, or `None` when no provider is available.
    #[must_use]
    pub fn llm(&self) -> Option<Arc<LlmService>> {
        self.llm.clone()
    }
}
