//! Batch planning: count-based chunking and token-aware bin-packing.

use crate::tokens::{TOKENS_PER_FINDING, estimate_tokens};
use crate::types::{BatchingMode, ItemGroup, SkipReason, SkippedFinding};

/// A planned batch of groups, ready for one provider call.
#[derive(Debug)]
pub struct PlannedBatch<T> {
    pub groups: Vec<ItemGroup<T>>,
    pub estimated_tokens: usize,
}

impl<T> PlannedBatch<T> {
    /// Items of every group in the batch, flattened in group order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    /// Shared content for the batch: the last group content present, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.groups.iter().rev().find_map(|g| g.content.as_deref())
    }
}

/// Complete plan: batches to execute plus findings excluded from all of
/// them. `skipped` is flat; which group a finding came from is not the
/// caller's concern.
#[derive(Debug)]
pub struct BatchPlan<T> {
    pub batches: Vec<PlannedBatch<T>>,
    pub skipped: Vec<SkippedFinding<T>>,
}

/// Plans batches for LLM processing.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    max_payload_tokens: usize,
    batch_size: usize,
    tokens_per_item: usize,
}

impl BatchPlanner {
    #[must_use]
    pub fn new(max_payload_tokens: usize, batch_size: usize) -> Self {
        Self {
            max_payload_tokens,
            batch_size,
            tokens_per_item: TOKENS_PER_FINDING,
        }
    }

    pub fn plan<T: Clone>(&self, groups: Vec<ItemGroup<T>>, mode: BatchingMode) -> BatchPlan<T> {
        match mode {
            BatchingMode::ExtendedContext => self.plan_extended_context(groups),
            BatchingMode::CountBased => self.plan_count_based(groups),
        }
    }

    /// Token-aware planning: estimate each group, reject groups that cannot
    /// fit alone, then first-fit-decreasing bin-pack the rest.
    fn plan_extended_context<T>(&self, groups: Vec<ItemGroup<T>>) -> BatchPlan<T> {
        let mut skipped = Vec::new();
        let mut group_tokens: Vec<(ItemGroup<T>, usize)> = Vec::new();

        for group in groups {
            let Some(content) = group.content.as_deref() else {
                skipped.extend(group.items.into_iter().map(|finding| SkippedFinding {
                    finding,
                    reason: SkipReason::MissingContent,
                }));
                continue;
            };

            let total_tokens =
                estimate_tokens(content) + group.items.len() * self.tokens_per_item;

            if total_tokens > self.max_payload_tokens {
                skipped.extend(group.items.into_iter().map(|finding| SkippedFinding {
                    finding,
                    reason: SkipReason::Oversized,
                }));
                continue;
            }

            group_tokens.push((group, total_tokens));
        }

        // Largest first packs tighter.
        group_tokens.sort_by(|a, b| b.1.cmp(&a.1));

        BatchPlan {
            batches: self.bin_pack(group_tokens),
            skipped,
        }
    }

    /// Greedy first-fit packing of pre-sorted groups.
    fn bin_pack<T>(&self, group_tokens: Vec<(ItemGroup<T>, usize)>) -> Vec<PlannedBatch<T>> {
        let mut batches: Vec<PlannedBatch<T>> = Vec::new();

        for (group, tokens) in group_tokens {
            let slot = batches
                .iter_mut()
                .find(|b| b.estimated_tokens + tokens <= self.max_payload_tokens);

            match slot {
                Some(batch) => {
                    batch.groups.push(group);
                    batch.estimated_tokens += tokens;
                }
                None => batches.push(PlannedBatch {
                    groups: vec![group],
                    estimated_tokens: tokens,
                }),
            }
        }

        batches
    }

    /// Count-based planning: flatten all items, chunk by `batch_size`, one
    /// synthetic content-free group per chunk.
    fn plan_count_based<T: Clone>(&self, groups: Vec<ItemGroup<T>>) -> BatchPlan<T> {
        let all_items: Vec<T> = groups.into_iter().flat_map(|g| g.items).collect();

        let batches = all_items
            .chunks(self.batch_size.max(1))
            .map(|chunk| PlannedBatch {
                estimated_tokens: chunk.len() * self.tokens_per_item,
                groups: vec![ItemGroup::new(chunk.to_vec())],
            })
            .collect();

        BatchPlan {
            batches,
            skipped: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SkipReason;

    fn group(count: usize, content: Option<usize>) -> ItemGroup<usize> {
        let mut g = ItemGroup::new((0..count).collect());
        if let Some(chars) = content {
            g = g.with_content("x".repeat(chars));
        }
        g
    }

    #[test]
    fn count_based_chunks_flattened_items() {
        let planner = BatchPlanner::new(10_000, 3);
        let plan = planner.plan(
            vec![group(4, None), group(3, None)],
            BatchingMode::CountBased,
        );

        assert_eq!(plan.batches.len(), 3);
        let sizes: Vec<usize> = plan
            .batches
            .iter()
            .map(|b| b.items().count())
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn count_based_preserves_item_order_across_groups() {
        let planner = BatchPlanner::new(10_000, 10);
        let plan = planner.plan(
            vec![
                ItemGroup::new(vec![1, 2]),
                ItemGroup::new(vec![3]),
                ItemGroup::new(vec![4, 5]),
            ],
            BatchingMode::CountBased,
        );

        let flattened: Vec<usize> = plan.batches[0].items().copied().collect();
        assert_eq!(flattened, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn count_based_ignores_group_content() {
        let planner = BatchPlanner::new(10_000, 50);
        let plan = planner.plan(vec![group(2, Some(100))], BatchingMode::CountBased);

        assert_eq!(plan.batches.len(), 1);
        assert!(plan.batches[0].content().is_none());
    }

    #[test]
    fn empty_input_produces_empty_plan() {
        let planner = BatchPlanner::new(10_000, 50);

        let plan = planner.plan(Vec::<ItemGroup<usize>>::new(), BatchingMode::CountBased);
        assert!(plan.batches.is_empty());

        let plan = planner.plan(Vec::<ItemGroup<usize>>::new(), BatchingMode::ExtendedContext);
        assert!(plan.batches.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn extended_context_skips_groups_without_content() {
        let planner = BatchPlanner::new(10_000, 50);
        let plan = planner.plan(
            vec![group(2, None), group(1, Some(40))],
            BatchingMode::ExtendedContext,
        );

        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::MissingContent));
    }

    #[test]
    fn oversized_group_is_skipped_entirely_with_no_batch() {
        let planner = BatchPlanner::new(100, 50);
        // 4000 chars ≈ 1000 tokens, far over the 100-token payload.
        let plan = planner.plan(vec![group(3, Some(4000))], BatchingMode::ExtendedContext);

        assert!(plan.batches.is_empty());
        assert_eq!(plan.skipped.len(), 3);
        assert!(plan.skipped.iter().all(|s| s.reason == SkipReason::Oversized));
    }

    #[test]
    fn extended_context_bin_packs_within_payload() {
        // Each group: 400 chars ≈ 100 tokens + 1 item * 200 = 300 tokens.
        // Payload 650 fits two groups per batch.
        let planner = BatchPlanner::new(650, 50);
        let plan = planner.plan(
            vec![group(1, Some(400)), group(1, Some(400)), group(1, Some(400))],
            BatchingMode::ExtendedContext,
        );

        assert_eq!(plan.batches.len(), 2);
        for batch in &plan.batches {
            assert!(batch.estimated_tokens <= 650);
        }
        let total_groups: usize = plan.batches.iter().map(|b| b.groups.len()).sum();
        assert_eq!(total_groups, 3);
    }

    #[test]
    fn every_group_lands_in_exactly_one_batch_or_skipped() {
        let planner = BatchPlanner::new(500, 50);
        let groups = vec![
            group(1, Some(400)),
            group(2, None),
            group(1, Some(10_000)),
            group(1, Some(100)),
        ];
        let total_items: usize = groups.iter().map(|g| g.items.len()).sum();

        let plan = planner.plan(groups, BatchingMode::ExtendedContext);

        let batched: usize = plan.batches.iter().map(|b| b.items().count()).sum();
        assert_eq!(batched + plan.skipped.len(), total_items);
    }
}
