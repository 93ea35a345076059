//! Component traits implemented by connectors and processors.
//!
//! Connectors extract data from external systems into messages; processors
//! (analysers and classifiers) transform upstream messages into derived
//! artifacts. Both are trusted plug-ins instantiated by factories from the
//! component registry.

use async_trait::async_trait;

use crate::error::ComponentError;
use crate::message::Message;
use crate::schema::Schema;

/// Per-artifact execution context handed to processors.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    /// Run identifier, used for cache scoping and provenance.
    pub run_id: String,
    /// Artifact id being produced, for logging and finding metadata.
    pub artifact_id: String,
}

/// Outcome of a processor invocation.
///
/// `Pending` signals that the processor submitted asynchronous work (an LLM
/// batch) and the artifact cannot complete in this run. The executor pauses
/// the artifact rather than failing it; the run resumes once the batches
/// referenced by `batch_ids` have been polled to completion.
#[derive(Debug)]
pub enum ProcessOutcome {
    Completed(Message),
    Pending { batch_ids: Vec<String> },
}

/// A data source: extracts content from an external system.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Extract data and produce a message conforming to `output_schema`.
    async fn extract(&self, output_schema: &Schema) -> Result<Message, ComponentError>;
}

/// A derived-artifact producer: analysers and classifiers.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Transform the input messages into an output message conforming to
    /// `output_schema`, or signal pending asynchronous work.
    async fn process(
        &self,
        inputs: &[Message],
        output_schema: &Schema,
        ctx: &ProcessContext,
    ) -> Result<ProcessOutcome, ComponentError>;
}
