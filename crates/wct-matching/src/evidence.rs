//! Evidence snippet extraction around pattern matches.

use std::collections::HashSet;

use wct_core::Evidence;

use crate::matcher::{MatchError, PatternMatcher};
use crate::types::PatternType;

const ELLIPSIS: &str = "...";

/// How much surrounding context a snippet carries on each side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextSize {
    #[default]
    Small,
    Medium,
    Large,
    /// The entire content as a single snippet, no truncation markers.
    Full,
}

impl ContextSize {
    /// Parse a configuration string; unknown values fall back to `Small`.
    #[must_use]
    pub fn from_config(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "medium" => Self::Medium,
            "large" => Self::Large,
            "full" => Self::Full,
            _ => Self::Small,
        }
    }

    /// Characters of context on each side, or `None` for full content.
    #[must_use]
    pub fn chars(self) -> Option<usize> {
        match self {
            Self::Small => Some(50),
            Self::Medium => Some(100),
            Self::Large => Some(200),
            Self::Full => None,
        }
    }
}

/// Clamp a byte offset to the nearest char boundary at or before it.
fn floor_char_boundary(content: &str, mut index: usize) -> usize {
    index = index.min(content.len());
    while index > 0 && !content.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Clamp a byte offset to the nearest char boundary at or after it.
fn ceil_char_boundary(content: &str, mut index: usize) -> usize {
    index = index.min(content.len());
    while index < content.len() && !content.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Extract a snippet around a match, with ellipsis markers when truncated.
pub(crate) fn window_snippet(
    content: &str,
    match_start: usize,
    match_length: usize,
    context_size: ContextSize,
) -> String {
    let Some(context_chars) = context_size.chars() else {
        return content.trim().to_string();
    };

    let window_start = floor_char_boundary(content, match_start.saturating_sub(context_chars));
    let window_end = ceil_char_boundary(
        content,
        (match_start + match_length).saturating_add(context_chars),
    );

    let mut snippet = content[window_start..window_end].trim().to_string();
    if snippet.is_empty() {
        return snippet;
    }

    if window_start > 0 {
        snippet = format!("{ELLIPSIS}{snippet}");
    }
    if window_end < content.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

/// Extracts unique evidence snippets for pattern matches in content.
#[derive(Debug, Default)]
pub struct EvidenceExtractor;

impl EvidenceExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Collect up to `max_evidence` unique snippets showing where `pattern`
    /// occurs in `content`.
    ///
    /// Snippets are deduplicated by text and returned sorted by content, so
    /// the output is deterministic and repeated extraction yields the same
    /// list. With `ContextSize::Full` at most one snippet is produced.
    pub fn extract_evidence(
        &self,
        content: &str,
        pattern: &str,
        max_evidence: usize,
        context_size: ContextSize,
        pattern_type: PatternType,
    ) -> Result<Vec<Evidence>, MatchError> {
        if content.is_empty() || pattern.is_empty() || max_evidence == 0 {
            return Ok(Vec::new());
        }

        let matcher = PatternMatcher::new();
        let matches = match pattern_type {
            PatternType::WordBoundary => matcher.find_all(content, pattern),
            PatternType::Regex => matcher.find_all_values(content, pattern)?,
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();

        for m in matches {
            if seen.len() >= max_evidence {
                break;
            }

            let snippet = window_snippet(content, m.start, m.len(), context_size);
            if !snippet.is_empty() && seen.insert(snippet.clone()) {
                items.push(Evidence::new(snippet));
            }

            // Full context contains everything; one snippet is enough.
            if context_size == ContextSize::Full {
                break;
            }
        }

        items.sort_by(|a, b| a.content.cmp(&b.content));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str, pattern: &str, max: usize, size: ContextSize) -> Vec<Evidence> {
        EvidenceExtractor::new()
            .extract_evidence(content, pattern, max, size, PatternType::WordBoundary)
            .unwrap()
    }

    #[test]
    fn extracts_snippet_containing_the_match() {
        let evidence = extract("the email field is here", "email", 3, ContextSize::Small);

        assert_eq!(evidence.len(), 1);
        assert!(evidence[0].content.contains("email"));
    }

    #[test]
    fn short_content_has_no_ellipsis() {
        let evidence = extract("email", "email", 3, ContextSize::Small);
        assert_eq!(evidence[0].content, "email");
    }

    #[test]
    fn truncated_context_is_ellipsis_marked() {
        let padding = "x".repeat(200);
        let content = format!("{padding} email {padding}");
        let evidence = extract(&content, "email", 3, ContextSize::Small);

        assert_eq!(evidence.len(), 1);
        assert!(evidence[0].content.starts_with("..."));
        assert!(evidence[0].content.ends_with("..."));
        assert!(evidence[0].content.contains("email"));
    }

    #[test]
    fn context_sizes_expand_the_window() {
        let padding = "x".repeat(300);
        let content = format!("{padding} email {padding}");

        let small = extract(&content, "email", 1, ContextSize::Small);
        let medium = extract(&content, "email", 1, ContextSize::Medium);
        let large = extract(&content, "email", 1, ContextSize::Large);

        assert!(small[0].content.len() < medium[0].content.len());
        assert!(medium[0].content.len() < large[0].content.len());
    }

    #[test]
    fn full_context_returns_entire_content_once() {
        let content = "email here and email there and email everywhere";
        let evidence = extract(content, "email", 5, ContextSize::Full);

        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].content, content);
    }

    #[test]
    fn duplicate_snippets_are_collapsed() {
        // Identical surroundings produce identical snippets.
        let content = "email\n".repeat(5);
        let evidence = extract(&content, "email", 10, ContextSize::Full);

        assert_eq!(evidence.len(), 1);
    }

    #[test]
    fn max_evidence_caps_unique_snippets() {
        // Each block keeps its marker inside the 50-char window so every
        // snippet is unique.
        let mut content = String::new();
        for i in 0..10 {
            content.push_str(&format!(
                "block{i} {} email {} tail{i}\n",
                "y".repeat(30),
                "z".repeat(30)
            ));
        }

        let evidence = extract(&content, "email", 2, ContextSize::Small);
        assert_eq!(evidence.len(), 2);
    }

    #[test]
    fn max_evidence_zero_returns_empty() {
        let evidence = extract("email here", "email", 0, ContextSize::Small);
        assert!(evidence.is_empty());
    }

    #[test]
    fn extraction_is_idempotent_and_sorted() {
        let padding = "p".repeat(80);
        let content = format!("alpha email one {padding} beta email two {padding} gamma email three");

        let first = extract(&content, "email", 5, ContextSize::Small);
        let second = extract(&content, "email", 5, ContextSize::Small);

        let first_texts: Vec<_> = first.iter().map(|e| e.content.clone()).collect();
        let second_texts: Vec<_> = second.iter().map(|e| e.content.clone()).collect();
        assert_eq!(first_texts, second_texts);

        let mut sorted = first_texts.clone();
        sorted.sort();
        assert_eq!(first_texts, sorted);
    }

    #[test]
    fn regex_evidence_uses_actual_match_length() {
        let content = "contact us at someone@example.com for details";
        let evidence = EvidenceExtractor::new()
            .extract_evidence(content, r"\w+@\w+\.\w+", 3, ContextSize::Small, PatternType::Regex)
            .unwrap();

        assert_eq!(evidence.len(), 1);
        assert!(evidence[0].content.contains("someone@example.com"));
    }

    #[test]
    fn multibyte_content_does_not_split_char_boundaries() {
        let content = format!("{} email {}", "é".repeat(60), "ü".repeat(60));
        let evidence = extract(&content, "email", 3, ContextSize::Small);

        assert_eq!(evidence.len(), 1);
        assert!(evidence[0].content.contains("email"));
    }
}
