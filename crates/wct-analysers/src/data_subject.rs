//! Data-subject analyser: detects which categories of natural persons a
//! data source concerns.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use wct_component::{ProcessorFactory, ServiceContainer};
use wct_core::{
    ComponentError, Evidence, FindingMetadata, MatchedPattern, Message, ProcessContext,
    ProcessOutcome, Processor, RiskLevel, Schema,
};
use wct_llm::LlmService;
use wct_matching::PatternMatcher;
use wct_rulesets::{DATA_SUBJECTS_RULESET, DataSubjectRule, load_ruleset};

use crate::config::AnalyserConfig;
use crate::input::{analysis_output, finding_id, parse_standard_input};
use crate::validation::{ValidationGroup, ValidationItem, ValidationOutcome, validate_findings};

/// One data-subject category detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSubjectFinding {
    pub id: String,
    pub category: String,
    pub risk_level: RiskLevel,
    pub matched_patterns: Vec<MatchedPattern>,
    pub evidence: Vec<Evidence>,
    pub metadata: FindingMetadata,
}

/// Factory for the `data_subject_analyser` processor.
pub struct DataSubjectAnalyserFactory;

impl ProcessorFactory for DataSubjectAnalyserFactory {
    fn component_name(&self) -> &str {
        "data_subject_analyser"
    }

    fn input_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("standard_input", "1.0.0")]
    }

    fn output_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("data_subject_finding", "1.0.0")]
    }

    fn can_create(&self, properties: &Map<String, Value>) -> bool {
        AnalyserConfig::from_properties(properties).is_ok()
    }

    fn create(
        &self,
        properties: &Map<String, Value>,
        services: &ServiceContainer,
    ) -> Result<Box<dyn Processor>, ComponentError> {
        Ok(Box::new(DataSubjectAnalyser {
            config: AnalyserConfig::from_properties(properties)?,
            llm: services.llm(),
        }))
    }
}

struct DataSubjectAnalyser {
    config: AnalyserConfig,
    llm: Option<Arc<LlmService>>,
}

#[async_trait]
impl Processor for DataSubjectAnalyser {
    async fn process(
        &self,
        inputs: &[Message],
        output_schema: &Schema,
        ctx: &ProcessContext,
    ) -> Result<ProcessOutcome, ComponentError> {
        let ruleset_uri = self
            .config
            .ruleset
            .clone()
            .unwrap_or_else(|| DATA_SUBJECTS_RULESET.to_string());
        let ruleset = load_ruleset::<DataSubjectRule>(&ruleset_uri)
            .map_err(|e| ComponentError::Config(e.to_string()))?;

        let matcher = PatternMatcher::new();
        let options = self.config.match_options();
        let mut findings: Vec<DataSubjectFinding> = Vec::new();
        let mut content_by_source: BTreeMap<String, String> = BTreeMap::new();

        for message in inputs {
            for item in parse_standard_input(message)? {
                content_by_source
                    .entry(item.source.clone())
                    .or_insert_with(|| item.content.clone());

                for rule in &ruleset.rules {
                    let Some(matched) = matcher
                        .match_rule(&rule.detection, &item.content, &options)
                        .map_err(|e| ComponentError::Processing(e.to_string()))?
                    else {
                        continue;
                    };
                    if matched.evidence.is_empty() {
                        continue;
                    }

                    let id = finding_id(
                        &ctx.artifact_id,
                        &item.source,
                        rule.detection.name(),
                        &matched.matched_patterns,
                    );
                    findings.push(DataSubjectFinding {
                        id,
                        category: rule.detection.name().to_string(),
                        risk_level: rule.detection.risk_level(),
                        matched_patterns: matched.matched_patterns,
                        evidence: matched.evidence,
                        metadata: FindingMetadata::new(&item.source)
                            .with_context("artifact_id", Value::String(ctx.artifact_id.clone())),
                    });
                }
            }
        }

        debug!(
            artifact_id = %ctx.artifact_id,
            findings = findings.len(),
            "Data-subject pattern pass complete"
        );

        let mut llm_validated = false;
        if self.config.llm_validation.enabled
            && !findings.is_empty()
            && let Some(llm) = &self.llm
        {
            let mut groups: BTreeMap<String, ValidationGroup> = BTreeMap::new();
            for finding in &findings {
                let group = groups
                    .entry(finding.metadata.source.clone())
                    .or_insert_with(|| ValidationGroup {
                        content: content_by_source.get(&finding.metadata.source).cloned(),
                        items: Vec::new(),
                        all_ids: Vec::new(),
                    });
                group.items.push(ValidationItem {
                    finding_id: finding.id.clone(),
                    label: finding.category.clone(),
                    source: finding.metadata.source.clone(),
                    evidence: finding.evidence.iter().map(|e| e.content.clone()).collect(),
                });
                group.all_ids.push(finding.id.clone());
            }

            match validate_findings(
                llm,
                "data subject",
                groups,
                &self.config.llm_validation,
                &ctx.run_id,
            )
            .await?
            {
                ValidationOutcome::Pending { batch_ids } => {
                    return Ok(ProcessOutcome::Pending { batch_ids });
                }
                ValidationOutcome::Decided { valid_ids } => {
                    findings.retain(|finding| valid_ids.contains(&finding.id));
                    llm_validated = true;
                }
            }
        }

        let high_risk_count = findings
            .iter()
            .filter(|finding| finding.risk_level == RiskLevel::High)
            .count();
        let content = analysis_output(&findings, high_risk_count, &ruleset_uri, llm_validated);

        Ok(ProcessOutcome::Completed(Message::new(
            Uuid::new_v4().to_string(),
            content,
            output_schema.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wct_store::InMemoryStore;

    fn standard_input(content: &str, source: &str) -> Message {
        Message::new(
            "input",
            json!({
                "schemaVersion": "1.0.0",
                "name": "fixture",
                "data": [{"content": content, "metadata": {"source": source}}]
            }),
            Schema::new("standard_input", "1.0.0"),
        )
    }

    async fn run(content: &str) -> Message {
        let services = ServiceContainer::new(Arc::new(InMemoryStore::new()));
        let analyser = DataSubjectAnalyserFactory
            .create(
                json!({"llm_validation": {"enabled": false}}).as_object().unwrap(),
                &services,
            )
            .unwrap();
        let outcome = analyser
            .process(
                &[standard_input(content, "crm.sql")],
                &Schema::new("data_subject_finding", "1.0.0"),
                &ProcessContext {
                    run_id: "run-1".to_string(),
                    artifact_id: "subjects".to_string(),
                },
            )
            .await
            .unwrap();
        let ProcessOutcome::Completed(message) = outcome else {
            panic!("expected completed outcome");
        };
        message
    }

    #[tokio::test]
    async fn detects_customer_and_employee_categories() {
        let message = run("customer table joined against employee payroll records").await;
        message.validate().unwrap();

        let categories: Vec<&str> = message.content()["findings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["category"].as_str().unwrap())
            .collect();

        assert!(categories.contains(&"customer"));
        assert!(categories.contains(&"employee"));
    }

    #[tokio::test]
    async fn patient_category_is_high_risk() {
        let message = run("patient admission records").await;

        let findings = message.content()["findings"].as_array().unwrap();
        let patient = findings.iter().find(|f| f["category"] == "patient").unwrap();
        assert_eq!(patient["risk_level"], "high");
        assert_eq!(message.content()["summary"]["high_risk_count"], 1);
    }

    #[tokio::test]
    async fn embedded_words_do_not_match() {
        // "minority" must not trip the "minor" pattern.
        let message = run("minority shareholding report").await;
        assert_eq!(message.content()["summary"]["total_findings"], 0);
    }
}
