//! Word-boundary and value-pattern scanning over content.

use regex::Regex;
use thiserror::Error;

use wct_core::{DetectionRule, Evidence, MatchedPattern};

use crate::evidence::{ContextSize, window_snippet};
use crate::grouping::group_matches_by_proximity;
use crate::types::{PatternMatch, PatternType};
use crate::{DEFAULT_MAX_REPRESENTATIVES, DEFAULT_PROXIMITY_THRESHOLD};

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Invalid value pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Tuning knobs for rule matching and evidence collection.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub max_evidence: usize,
    pub context_size: ContextSize,
    pub proximity_threshold: usize,
    pub max_representatives: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_evidence: 3,
            context_size: ContextSize::Small,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            max_representatives: DEFAULT_MAX_REPRESENTATIVES,
        }
    }
}

/// Aggregated outcome of matching one rule against one piece of content.
#[derive(Debug, Clone)]
pub struct RuleEvidence {
    /// Per-pattern occurrence counts, in rule declaration order.
    pub matched_patterns: Vec<MatchedPattern>,
    /// Deduplicated, sorted snippets for the proximity-group representatives.
    pub evidence: Vec<Evidence>,
}

/// Applies detection rules to content.
#[derive(Debug, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Find every case-insensitive word-boundary occurrence of `pattern`.
    ///
    /// A match requires both boundaries to be non-alphanumeric characters or
    /// string edges, so `age` does not match inside `package`, and `dna`
    /// does not match inside a base64 blob.
    #[must_use]
    pub fn find_all(&self, content: &str, pattern: &str) -> Vec<PatternMatch> {
        if content.is_empty() || pattern.is_empty() {
            return Vec::new();
        }

        let regex = match Regex::new(&format!("(?i){}", regex::escape(pattern))) {
            Ok(regex) => regex,
            // Escaped literals always compile; guard anyway.
            Err(_) => return Vec::new(),
        };

        regex
            .find_iter(content)
            .filter(|m| {
                let before_ok = content[..m.start()]
                    .chars()
                    .next_back()
                    .is_none_or(|c| !c.is_alphanumeric());
                let after_ok = content[m.end()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_alphanumeric());
                before_ok && after_ok
            })
            .map(|m| PatternMatch::new(m.start(), m.end(), PatternType::WordBoundary))
            .collect()
    }

    /// Find every occurrence of a value pattern, applied as a regex.
    pub fn find_all_values(
        &self,
        content: &str,
        pattern: &str,
    ) -> Result<Vec<PatternMatch>, MatchError> {
        if content.is_empty() || pattern.is_empty() {
            return Ok(Vec::new());
        }

        let regex = Regex::new(pattern).map_err(|e| MatchError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(regex
            .find_iter(content)
            .filter(|m| !m.is_empty())
            .map(|m| PatternMatch::new(m.start(), m.end(), PatternType::Regex))
            .collect())
    }

    /// Match one rule against content, grouping matches by proximity and
    /// extracting a snippet per group representative.
    ///
    /// Returns `None` when nothing matched.
    pub fn match_rule(
        &self,
        rule: &DetectionRule,
        content: &str,
        options: &MatchOptions,
    ) -> Result<Option<RuleEvidence>, MatchError> {
        let mut matched_patterns = Vec::new();
        let mut all_matches: Vec<PatternMatch> = Vec::new();

        for pattern in &rule.patterns {
            let matches = self.find_all(content, pattern);
            if !matches.is_empty() {
                matched_patterns.push(MatchedPattern {
                    pattern: pattern.clone(),
                    match_count: matches.len(),
                });
                all_matches.extend(matches);
            }
        }

        for pattern in &rule.value_patterns {
            let matches = self.find_all_values(content, pattern)?;
            if !matches.is_empty() {
                matched_patterns.push(MatchedPattern {
                    pattern: pattern.clone(),
                    match_count: matches.len(),
                });
                all_matches.extend(matches);
            }
        }

        if all_matches.is_empty() {
            return Ok(None);
        }

        all_matches.sort_by_key(|m| (m.start, m.end));
        let representatives = group_matches_by_proximity(
            &all_matches,
            options.proximity_threshold,
            options.max_representatives,
        );

        let mut seen = std::collections::HashSet::new();
        let mut evidence = Vec::new();
        for representative in representatives {
            if evidence.len() >= options.max_evidence {
                break;
            }
            let snippet = window_snippet(
                content,
                representative.start,
                representative.len(),
                options.context_size,
            );
            if !snippet.is_empty() && seen.insert(snippet.clone()) {
                evidence.push(Evidence::new(snippet));
            }
            if options.context_size == ContextSize::Full {
                break;
            }
        }
        evidence.sort_by(|a, b| a.content.cmp(&b.content));

        Ok(Some(RuleEvidence {
            matched_patterns,
            evidence,
        }))
    }
}
