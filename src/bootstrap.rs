//! Process wiring: component registry, artifact store, and LLM service.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use wct_analysers::{
    DataSubjectAnalyserFactory, PersonalDataAnalyserFactory, ProcessingPurposeAnalyserFactory,
};
use wct_component::{ComponentRegistry, ServiceContainer};
use wct_connectors::FilesystemConnectorFactory;
use wct_llm::{AnthropicProvider, LlmProvider, LlmService};
use wct_store::{ArtifactStore, FilesystemStore, InMemoryStore};

/// Default filesystem store location, relative to the working directory.
const DEFAULT_STORE_PATH: &str = ".waivern";

/// Register every built-in connector and processor.
pub fn build_registry() -> Result<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    registry
        .register_connector(Arc::new(FilesystemConnectorFactory))
        .context("registering filesystem connector")?;
    registry
        .register_processor(Arc::new(PersonalDataAnalyserFactory))
        .context("registering personal_data_analyser")?;
    registry
        .register_processor(Arc::new(DataSubjectAnalyserFactory))
        .context("registering data_subject_analyser")?;
    registry
        .register_processor(Arc::new(ProcessingPurposeAnalyserFactory))
        .context("registering processing_purpose_analyser")?;
    Ok(registry)
}

/// Select the store backend from `WAIVERN_STORE_TYPE` / `WAIVERN_STORE_PATH`.
pub fn build_store() -> Result<Arc<dyn ArtifactStore>> {
    let store_type = std::env::var("WAIVERN_STORE_TYPE").unwrap_or_else(|_| "filesystem".to_string());

    match store_type.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "filesystem" => {
            let base = std::env::var("WAIVERN_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string());
            debug!(base = %base, "Using filesystem artifact store");
            Ok(Arc::new(FilesystemStore::new(base)))
        }
        other => anyhow::bail!(
            "unknown WAIVERN_STORE_TYPE '{other}'; expected 'memory' or 'filesystem'"
        ),
    }
}

/// Build the configured LLM provider, if any.
///
/// `LLM_PROVIDER` selects the provider (default `anthropic`); a missing API
/// key degrades to no LLM service rather than failing the run, since
/// analysers work without validation.
pub fn build_llm_provider() -> Option<Arc<dyn LlmProvider>> {
    let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "anthropic".to_string());

    match provider.as_str() {
        "none" => None,
        "anthropic" => match AnthropicProvider::from_env() {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                warn!(error = %e, "LLM provider unavailable; analysers run without LLM validation");
                None
            }
        },
        other => {
            warn!(provider = %other, "Unknown LLM_PROVIDER; analysers run without LLM validation");
            None
        }
    }
}

/// Assemble the service container shared by all components of a run.
pub fn build_services(store: Arc<dyn ArtifactStore>) -> ServiceContainer {
    let mut services = ServiceContainer::new(Arc::clone(&store));
    if let Some(provider) = build_llm_provider() {
        services = services.with_llm(Arc::new(LlmService::new(provider, store)));
    }
    services
}
