//! LLM validation and enrichment subsystem.
//!
//! Processors hand the service groups of findings and a prompt builder; the
//! service plans batches (by count or token-aware bin-packing), checks the
//! run-scoped response cache, and calls the provider for misses. Providers
//! come in two delivery modes behind one trait: synchronous structured
//! calls, and asynchronous batch APIs where prompts are submitted together
//! and collected later by the [`BatchResultPoller`]. The cache is oblivious
//! to delivery mode; only the entry status distinguishes a pending batch
//! slot from a completed response.

mod batch;
mod cache;
mod error;
mod planner;
mod poller;
mod provider;
mod providers;
mod service;
mod tokens;
mod types;

#[doc(hidden)]
pub mod testing;

pub use batch::{BatchJob, BatchRequest, BatchResult, BatchState, BatchStatus, BatchSubmission};
pub use cache::{CacheEntry, CacheStatus};
pub use error::LlmError;
pub use planner::{BatchPlan, BatchPlanner, PlannedBatch};
pub use poller::{BatchResultPoller, PollResult};
pub use provider::{BatchLlmProvider, LlmProvider, ResponseFormat};
pub use providers::anthropic::AnthropicProvider;
pub use service::{CompletionOutcome, LlmService};
pub use tokens::{RESERVED_OUTPUT_TOKENS, TOKENS_PER_FINDING, estimate_tokens, max_payload_tokens};
pub use types::{
    BatchingMode, ItemGroup, LlmCompletionResult, PromptBuilder, SkipReason, SkippedFinding,
};
