//! LLM validation of pattern findings.
//!
//! Findings are grouped by their source, sampled, and judged by the model.
//! Decisions are group-level: a source group is dropped only when every
//! sampled finding in it is judged a false positive; any confirmed finding
//! keeps the whole group. Findings the service could not process (skipped
//! or missing from the response) are kept, so validation can only ever
//! remove findings, never invent confidence.

use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use wct_core::ComponentError;
use wct_llm::{CompletionOutcome, ItemGroup, LlmService, PromptBuilder};

use crate::config::LlmValidationConfig;

/// A finding flattened for the validation prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationItem {
    pub finding_id: String,
    /// Detected category / purpose label.
    pub label: String,
    pub source: String,
    pub evidence: Vec<String>,
}

/// Structured response expected from the model.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindingValidationResponse {
    pub results: Vec<FindingVerdict>,
}

/// Per-finding verdict.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindingVerdict {
    pub finding_id: String,
    /// True when the evidence genuinely indicates the detected category.
    pub valid: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Outcome of a validation pass.
pub enum ValidationOutcome {
    /// Ids of findings that survive validation.
    Decided { valid_ids: HashSet<String> },
    /// Work was submitted to a batch provider; the artifact must pause.
    Pending { batch_ids: Vec<String> },
}

struct ValidationPromptBuilder {
    domain: String,
}

impl PromptBuilder<ValidationItem> for ValidationPromptBuilder {
    fn build_prompt(&self, items: &[ValidationItem], content: Option<&str>) -> String {
        let mut prompt = format!(
            "You are reviewing automated {domain} detections for false positives.\n\
             For each finding below, decide whether the evidence genuinely indicates\n\
             the detected label, or whether the match is incidental (an identifier\n\
             fragment, unrelated prose, test data, or encoded content).\n",
            domain = self.domain
        );
        if let Some(content) = content {
            prompt.push_str("\nThe findings were detected in this content:\n---\n");
            prompt.push_str(content);
            prompt.push_str("\n---\n");
        }
        prompt.push_str("\nFindings:\n");
        prompt.push_str(&serde_json::to_string_pretty(items).unwrap_or_default());
        prompt.push_str(
            "\n\nReturn a verdict for every finding id, in the order given.",
        );
        prompt
    }
}

/// A source group offered for validation.
pub(crate) struct ValidationGroup {
    /// Shared content for extended-context batching.
    pub content: Option<String>,
    pub items: Vec<ValidationItem>,
    /// Every finding id in the group, sampled or not.
    pub all_ids: Vec<String>,
}

/// Validate findings with group-level decisions.
pub(crate) async fn validate_findings(
    llm: &LlmService,
    domain: &str,
    groups: BTreeMap<String, ValidationGroup>,
    config: &LlmValidationConfig,
    run_id: &str,
) -> Result<ValidationOutcome, ComponentError> {
    let sample_size = config.sample_size.max(1);

    let mut sampled_groups: Vec<ItemGroup<ValidationItem>> = Vec::new();
    for group in groups.values() {
        let sampled: Vec<ValidationItem> =
            group.items.iter().take(sample_size).cloned().collect();
        let mut item_group = ItemGroup::new(sampled);
        if let Some(content) = &group.content {
            item_group = item_group.with_content(content.clone());
        }
        sampled_groups.push(item_group);
    }

    let builder = ValidationPromptBuilder {
        domain: domain.to_string(),
    };

    let outcome = llm
        .complete_typed::<ValidationItem, FindingValidationResponse>(
            sampled_groups,
            &builder,
            config.batching_mode.into(),
            run_id,
        )
        .await
        .map_err(|e| ComponentError::Processing(format!("LLM validation failed: {e}")))?;

    let result = match outcome {
        CompletionOutcome::Pending(jobs) => {
            return Ok(ValidationOutcome::Pending {
                batch_ids: jobs.into_iter().map(|job| job.batch_id).collect(),
            });
        }
        CompletionOutcome::Ready(result) => result,
    };

    let mut verdicts: BTreeMap<String, bool> = BTreeMap::new();
    for response in &result.responses {
        for verdict in &response.results {
            verdicts.insert(verdict.finding_id.clone(), verdict.valid);
        }
    }
    // Skipped findings never reached the model; keep them.
    for skipped in &result.skipped {
        verdicts.insert(skipped.finding.finding_id.clone(), true);
    }

    let mut valid_ids = HashSet::new();
    for (source, group) in &groups {
        let sampled_ids: Vec<&str> = group
            .items
            .iter()
            .take(sample_size)
            .map(|item| item.finding_id.as_str())
            .collect();

        // Missing verdicts count as confirmations.
        let all_rejected = !sampled_ids.is_empty()
            && sampled_ids
                .iter()
                .all(|id| verdicts.get(*id).copied() == Some(false));

        if all_rejected {
            debug!(source = %source, findings = group.all_ids.len(), "Dropping group as false positives");
        } else {
            valid_ids.extend(group.all_ids.iter().cloned());
        }
    }

    Ok(ValidationOutcome::Decided { valid_ids })
}
