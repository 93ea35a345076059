//! Personal-data analyser: detects personal-data categories in standard
//! input content.

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
use wct_rulesets::{PERSONAL_DATA_RULESET, PersonalDataRule, load_ruleset};

use crate::config::AnalyserConfig;
use crate::input::{analysis_output, finding_id, parse_standard_input};
use crate::validation::{ValidationGroup, ValidationItem, ValidationOutcome, validate_findings};

/// One personal-data detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalDataFinding {
    pub id: String,
    pub category: String,
    pub risk_level: RiskLevel,
    pub special_category: bool,
    pub matched_patterns: Vec<MatchedPattern>,
    pub evidence: Vec<Evidence>,
    pub metadata: FindingMetadata,
}

/// Factory for the `personal_data_analyser` processor.
pub struct PersonalDataAnalyserFactory;

impl ProcessorFactory for PersonalDataAnalyserFactory {
    fn component_name(&self) -> &str {
        "personal_data_analyser"
    }

    fn input_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("standard_input", "1.0.0")]
    }

    fn output_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("personal_data_finding", "1.0.0")]
    }

    fn can_create(&self, properties: &Map<String, Value>) -> bool {
        AnalyserConfig::from_properties(properties).is_ok()
    }

    fn create(
        &self,
        properties: &Map<String, Value>,
        services: &ServiceContainer,
    ) -> Result<Box<dyn Processor>, ComponentError> {
        Ok(Box::new(PersonalDataAnalyser {
            config: AnalyserConfig::from_properties(properties)?,
            llm: services.llm(),
        }))
    }
}

struct PersonalDataAnalyser {
    config: AnalyserConfig,
    llm: Option<Arc<LlmService>>,
}

#[async_trait]
impl Processor for PersonalDataAnalyser {
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
            .unwrap_or_else(|| PERSONAL_DATA_RULESET.to_string());
        let ruleset = load_ruleset::<PersonalDataRule>(&ruleset_uri)
            .map_err(|e| ComponentError::Config(e.to_string()))?;

        let matcher = PatternMatcher::new();
        let options = self.config.match_options();
        let mut findings: Vec<PersonalDataFinding> = Vec::new();
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
                    findings.push(PersonalDataFinding {
                        id,
                        category: rule.detection.name().to_string(),
                        risk_level: rule.detection.risk_level(),
                        special_category: rule.special_category,
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
            ruleset = %ruleset_uri,
            "Personal-data pattern pass complete"
        );

        let mut llm_validated = false;
        if self.config.llm_validation.enabled && !findings.is_empty() {
            if let Some(llm) = &self.llm {
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
                    "personal data",
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
            } else {
                debug!("LLM validation enabled but no provider configured; keeping pattern findings");
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

    fn standard_input(items: &[(&str, &str)]) -> Message {
        Message::new(
            "input",
            json!({
                "schemaVersion": "1.0.0",
                "name": "fixture",
                "data": items
                    .iter()
                    .map(|(content, source)| json!({
                        "content": content,
                        "metadata": {"source": source}
                    }))
                    .collect::<Vec<_>>()
            }),
            Schema::new("standard_input", "1.0.0"),
        )
    }

    fn analyser(properties: Value) -> Box<dyn Processor> {
        let services = ServiceContainer::new(Arc::new(InMemoryStore::new()));
        PersonalDataAnalyserFactory
            .create(properties.as_object().unwrap(), &services)
            .unwrap()
    }

    fn ctx() -> ProcessContext {
        ProcessContext {
            run_id: "run-1".to_string(),
            artifact_id: "findings".to_string(),
        }
    }

    async fn run(analyser: &dyn Processor, input: Message) -> Message {
        let outcome = analyser
            .process(
                &[input],
                &Schema::new("personal_data_finding", "1.0.0"),
                &ctx(),
            )
            .await
            .unwrap();
        let ProcessOutcome::Completed(message) = outcome else {
            panic!("expected completed outcome");
        };
        message
    }

    #[tokio::test]
    async fn detects_email_in_content() {
        let analyser = analyser(json!({"llm_validation": {"enabled": false}}));
        let input = standard_input(&[("the user email is user@example.com", "users.sql")]);

        let message = run(analyser.as_ref(), input).await;
        message.validate().unwrap();

        let findings = message.content()["findings"].as_array().unwrap();
        let email = findings
            .iter()
            .find(|f| f["category"] == "email")
            .expect("email finding");
        assert!(
            email["matched_patterns"]
                .as_array()
                .unwrap()
                .iter()
                .any(|p| p["pattern"] == "email")
        );
        assert_eq!(email["metadata"]["source"], "users.sql");
        assert_eq!(email["special_category"], false);
    }

    #[tokio::test]
    async fn special_category_rules_flag_findings() {
        let analyser = analyser(json!({"llm_validation": {"enabled": false}}));
        let input = standard_input(&[("column: blood_type varchar(3)", "schema.sql")]);

        let message = run(analyser.as_ref(), input).await;

        let findings = message.content()["findings"].as_array().unwrap();
        let health = findings
            .iter()
            .find(|f| f["category"] == "health")
            .expect("health finding");
        assert_eq!(health["special_category"], true);
        assert_eq!(health["risk_level"], "high");
    }

    #[tokio::test]
    async fn clean_content_produces_no_findings() {
        let analyser = analyser(json!({"llm_validation": {"enabled": false}}));
        let input = standard_input(&[("nothing sensitive in this text", "notes.txt")]);

        let message = run(analyser.as_ref(), input).await;

        assert_eq!(message.content()["summary"]["total_findings"], 0);
        assert_eq!(
            message.content()["analysis_metadata"]["llm_validation_enabled"],
            false
        );
    }

    #[tokio::test]
    async fn summary_counts_high_risk_findings() {
        let analyser = analyser(json!({"llm_validation": {"enabled": false}}));
        let input = standard_input(&[("password and email fields", "config.txt")]);

        let message = run(analyser.as_ref(), input).await;

        let summary = &message.content()["summary"];
        assert_eq!(summary["total_findings"], 2);
        assert_eq!(summary["high_risk_count"], 1);
    }

    #[tokio::test]
    async fn validation_disabled_without_provider_keeps_findings() {
        // llm_validation defaults to enabled, but no provider is registered.
        let analyser = analyser(json!({}));
        let input = standard_input(&[("email: user@example.com", "a.txt")]);

        let message = run(analyser.as_ref(), input).await;

        assert!(message.content()["summary"]["total_findings"].as_u64().unwrap() >= 1);
        assert_eq!(
            message.content()["analysis_metadata"]["llm_validation_enabled"],
            false
        );
    }
}
