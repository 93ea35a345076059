//! Shared types for the LLM service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A group of findings offered to the service together.
///
/// In extended-context mode a group carries shared `content` (typically a
/// source-file body) that every item in the group refers to; groups are
/// then kept intact across batching. In count-based mode the group
/// structure is ignored and items are flattened.
#[derive(Debug, Clone)]
pub struct ItemGroup<T> {
    pub items: Vec<T>,
    pub content: Option<String>,
}

impl<T> ItemGroup<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            content: None,
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// How the service splits work into provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchingMode {
    /// Flatten all items across groups and chunk by count.
    #[default]
    CountBased,
    /// Keep groups intact and bin-pack them by token estimate.
    ExtendedContext,
}

/// Why a finding was excluded from every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The finding's group exceeded the model's maximum payload on its own.
    Oversized,
    /// Extended-context mode requires group content, and there was none.
    MissingContent,
}

/// A finding that could not be processed, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedFinding<T> {
    pub finding: T,
    pub reason: SkipReason,
}

/// Outcome of a completed (non-pending) service call.
///
/// `responses` holds one structured response per executed batch, in batch
/// execution order. `skipped` is a flat list of individual findings; the
/// group structure is an internal batching concern and is not preserved.
#[derive(Debug)]
pub struct LlmCompletionResult<T, R> {
    pub responses: Vec<R>,
    pub skipped: Vec<SkippedFinding<T>>,
}

impl<T, R> LlmCompletionResult<T, R> {
    /// Map responses into a typed model, keeping skips untouched.
    pub fn map_responses<U>(
        self,
        mut f: impl FnMut(R) -> Result<U, serde_json::Error>,
    ) -> Result<LlmCompletionResult<T, U>, serde_json::Error> {
        let responses = self
            .responses
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LlmCompletionResult {
            responses,
            skipped: self.skipped,
        })
    }
}

/// Builds prompts from batch items and optional shared content.
///
/// Implemented by processors; the service owns batching and caching, the
/// builder owns the domain wording.
pub trait PromptBuilder<T>: Send + Sync {
    fn build_prompt(&self, items: &[T], content: Option<&str>) -> String;
}

/// Convenience alias for raw structured responses before typed decoding.
pub type RawResponse = Value;
