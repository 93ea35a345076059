//! Pattern matching and evidence extraction.
//!
//! Text patterns match case-insensitively on word boundaries: both ends of
//! an occurrence must touch a non-alphanumeric character or a string edge,
//! which rejects substrings inside identifiers and base64 blobs. Value
//! patterns are plain regexes. Matches are grouped by proximity before
//! evidence snippets are extracted so that dense clusters produce one
//! representative snippet instead of dozens.

mod evidence;
mod grouping;
mod matcher;
mod types;

pub use evidence::{ContextSize, EvidenceExtractor};
pub use grouping::group_matches_by_proximity;
pub use matcher::{MatchError, MatchOptions, PatternMatcher, RuleEvidence};
pub use types::{PatternMatch, PatternType};

/// Default start-to-start distance below which matches collapse into one
/// proximity group.
pub const DEFAULT_PROXIMITY_THRESHOLD: usize = 200;

/// Default cap on proximity-group representatives per rule.
pub const DEFAULT_MAX_REPRESENTATIVES: usize = 10;
