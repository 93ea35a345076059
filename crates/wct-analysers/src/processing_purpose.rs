//! Processing-purpose analyser: detects purposes of personal-data
//! processing and third-party service integrations in code and
//! configuration content.

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
use wct_rulesets::{
    PROCESSING_PURPOSES_RULESET, ProcessingPurposeRule, SERVICE_INTEGRATIONS_RULESET,
    load_ruleset,
};

use crate::config::AnalyserConfig;
use crate::input::{analysis_output, finding_id, parse_standard_input};
use crate::validation::{ValidationGroup, ValidationItem, ValidationOutcome, validate_findings};

/// One processing-purpose (or service-integration) detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingPurposeFinding {
    pub id: String,
    pub purpose: String,
    pub purpose_category: String,
    pub risk_level: RiskLevel,
    pub matched_patterns: Vec<MatchedPattern>,
    pub evidence: Vec<Evidence>,
    pub metadata: FindingMetadata,
}

/// Factory for the `processing_purpose_analyser` processor.
pub struct ProcessingPurposeAnalyserFactory;

impl ProcessorFactory for ProcessingPurposeAnalyserFactory {
    fn component_name(&self) -> &str {
        "processing_purpose_analyser"
    }

    fn input_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("standard_input", "1.0.0")]
    }

    fn output_schemas(&self) -> Vec<Schema> {
        vec![Schema::new("processing_purpose_finding", "1.0.0")]
    }

    fn can_create(&self, properties: &Map<String, Value>) -> bool {
        AnalyserConfig::from_properties(properties).is_ok()
    }

    fn create(
        &self,
        properties: &Map<String, Value>,
        services: &ServiceContainer,
    ) -> Result<Box<dyn Processor>, ComponentError> {
        Ok(Box::new(ProcessingPurposeAnalyser {
            config: AnalyserConfig::from_properties(properties)?,
            llm: services.llm(),
        }))
    }
}

struct ProcessingPurposeAnalyser {
    config: AnalyserConfig,
    llm: Option<Arc<LlmService>>,
}

#[async_trait]
impl Processor for ProcessingPurposeAnalyser {
    async fn process(
        &self,
        inputs: &[Message],
        output_schema: &Schema,
        ctx: &ProcessContext,
    ) -> Result<ProcessOutcome, ComponentError> {
        let purposes_uri = self
            .config
            .ruleset
            .clone()
            .unwrap_or_else(|| PROCESSING_PURPOSES_RULESET.to_string());
        let purposes = load_ruleset::<ProcessingPurposeRule>(&purposes_uri)
            .map_err(|e| ComponentError::Config(e.to_string()))?;
        // Service integrations are always scanned alongside the purposes;
        // an SDK endpoint in code is itself evidence of a purpose.
        let integrations = load_ruleset::<ProcessingPurposeRule>(SERVICE_INTEGRATIONS_RULESET)
            .map_err(|e| ComponentError::Config(e.to_string()))?;

        let matcher = PatternMatcher::new();
        let options = self.config.match_options();
        let mut findings: Vec<ProcessingPurposeFinding> = Vec::new();
        let mut content_by_source: BTreeMap<String, String> = BTreeMap::new();

        for message in inputs {
            for item in parse_standard_input(message)? {
                content_by_source
                    .entry(item.source.clone())
                    .or_insert_with(|| item.content.clone());

                for rule in purposes.rules.iter().chain(integrations.rules.iter()) {
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
                    findings.push(ProcessingPurposeFinding {
                        id,
                        purpose: rule.detection.name().to_string(),
                        purpose_category: rule.purpose_category.clone(),
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
            "Processing-purpose pattern pass complete"
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
                    label: finding.purpose.clone(),
                    source: finding.metadata.source.clone(),
                    evidence: finding.evidence.iter().map(|e| e.content.clone()).collect(),
                });
                group.all_ids.push(finding.id.clone());
            }

            match validate_findings(
                llm,
                "processing purpose",
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
        let content = analysis_output(&findings, high_risk_count, &purposes_uri, llm_validated);

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

    async fn run(content: &str) -> Message {
        let services = ServiceContainer::new(Arc::new(InMemoryStore::new()));
        let analyser = ProcessingPurposeAnalyserFactory
            .create(
                json!({"llm_validation": {"enabled": false}}).as_object().unwrap(),
                &services,
            )
            .unwrap();
        let input = Message::new(
            "input",
            json!({
                "schemaVersion": "1.0.0",
                "name": "fixture",
                "data": [{"content": content, "metadata": {"source": "app.js"}}]
            }),
            Schema::new("standard_input", "1.0.0"),
        );
        let outcome = analyser
            .process(
                &[input],
                &Schema::new("processing_purpose_finding", "1.0.0"),
                &ProcessContext {
                    run_id: "run-1".to_string(),
                    artifact_id: "purposes".to_string(),
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
    async fn detects_purposes_with_categories() {
        let message = run("signup sends the newsletter and a payment invoice").await;
        message.validate().unwrap();

        let findings = message.content()["findings"].as_array().unwrap();
        let marketing = findings
            .iter()
            .find(|f| f["purpose"] == "marketing_communications")
            .expect("marketing finding");
        assert_eq!(marketing["purpose_category"], "marketing");

        let payment = findings
            .iter()
            .find(|f| f["purpose"] == "payment_processing")
            .expect("payment finding");
        assert_eq!(payment["purpose_category"], "operational");
        assert_eq!(payment["risk_level"], "high");
    }

    #[tokio::test]
    async fn detects_service_integrations_by_endpoint() {
        let message = run("fetch('https://api.stripe.com/v1/charges')").await;

        let findings = message.content()["findings"].as_array().unwrap();
        let stripe = findings
            .iter()
            .find(|f| f["purpose"] == "stripe")
            .expect("stripe integration finding");
        assert_eq!(stripe["purpose_category"], "operational");
        assert!(
            stripe["evidence"][0]["content"]
                .as_str()
                .unwrap()
                .contains("api.stripe.com")
        );
    }

    #[tokio::test]
    async fn plain_content_has_no_purposes() {
        let message = run("const x = 1; // arithmetic only").await;
        assert_eq!(message.content()["summary"]["total_findings"], 0);
    }
}
