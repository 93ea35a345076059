//! Token estimation heuristics for batch planning.
//!
//! Estimates only steer bin-packing; they do not need to be exact, but
//! they must be deterministic and err on the generous side.

/// Rough characters-per-token ratio for English prose and code.
const CHARS_PER_TOKEN: usize = 4;

/// Estimated prompt tokens contributed by one serialised finding.
pub const TOKENS_PER_FINDING: usize = 200;

/// Output allowance reserved out of the model's context window.
pub const RESERVED_OUTPUT_TOKENS: usize = 8192;

/// Estimate the token count of a text.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Maximum prompt payload for a model, leaving room for the response.
#[must_use]
pub fn max_payload_tokens(context_window: usize) -> usize {
    context_window.saturating_sub(RESERVED_OUTPUT_TOKENS)
}
