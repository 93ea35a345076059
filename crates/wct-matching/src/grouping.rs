//! Proximity-based match grouping.
//!
//! Dense clusters of matches describe the same spot in the content; one
//! representative per cluster is enough for evidence. Matches are chained:
//! a match joins the current group when its start is within the threshold
//! of the previous match's start, so a long run of closely spaced matches
//! forms a single group even when its extremes are far apart.

use crate::types::PatternMatch;

/// Collapse matches into proximity groups and return the representative
/// (first match) of each group, capped at `max_representatives`.
///
/// `matches` must be sorted by start offset. A start-to-start distance
/// exactly equal to `threshold` keeps the matches in the same group;
/// strictly greater separates them.
#[must_use]
pub fn group_matches_by_proximity(
    matches: &[PatternMatch],
    threshold: usize,
    max_representatives: usize,
) -> Vec<PatternMatch> {
    let mut representatives = Vec::new();
    let mut previous_start: Option<usize> = None;

    for m in matches {
        let starts_new_group = match previous_start {
            None => true,
            Some(prev) => m.start.saturating_sub(prev) > threshold,
        };

        if starts_new_group {
            if representatives.len() >= max_representatives {
                break;
            }
            representatives.push(*m);
        }
        previous_start = Some(m.start);
    }

    representatives
}
