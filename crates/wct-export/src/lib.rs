//! Report exporters.
//!
//! An exporter turns an [`ExecutionResult`] into a serialised report. The
//! plain JSON exporter emits the result envelope canonically (JCS) for
//! stable diffs; the framework exporters wrap the same envelope with the
//! framework name and a risk summary computed over the output artifacts'
//! findings.

use serde_json::{Value, json};
use thiserror::Error;

use wct_orchestration::{ExecutionResult, Framework};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialise report: {0}")]
    Serialise(String),
}

/// Renders an execution result as a report document.
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    fn export(&self, result: &ExecutionResult) -> Result<String, ExportError>;
}

/// Canonical JSON export of the raw execution result.
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    fn export(&self, result: &ExecutionResult) -> Result<String, ExportError> {
        let value = serde_json::to_value(result).map_err(|e| ExportError::Serialise(e.to_string()))?;
        canonical(&value)
    }
}

/// Framework report: the result envelope plus framework name and summary.
pub struct FrameworkExporter {
    name: &'static str,
    framework_label: &'static str,
}

impl FrameworkExporter {
    #[must_use]
    pub fn gdpr() -> Self {
        Self {
            name: "gdpr",
            framework_label: "GDPR",
        }
    }

    #[must_use]
    pub fn uk_gdpr() -> Self {
        Self {
            name: "uk_gdpr",
            framework_label: "UK_GDPR",
        }
    }

    #[must_use]
    pub fn ccpa() -> Self {
        Self {
            name: "ccpa",
            framework_label: "CCPA",
        }
    }
}

impl Exporter for FrameworkExporter {
    fn name(&self) -> &str {
        self.name
    }

    fn export(&self, result: &ExecutionResult) -> Result<String, ExportError> {
        let report =
            serde_json::to_value(result).map_err(|e| ExportError::Serialise(e.to_string()))?;

        let value = json!({
            "framework": self.framework_label,
            "summary": summarise(result),
            "report": report,
        });
        canonical(&value)
    }
}

/// Resolve the exporter for a run: an explicit name wins, then the
/// runbook's framework, then plain JSON.
pub fn exporter_for(
    framework: Option<Framework>,
    name_override: Option<&str>,
) -> Result<Box<dyn Exporter>, ExportError> {
    let name = match name_override {
        Some(name) => name.to_string(),
        None => match framework {
            Some(Framework::Gdpr) => "gdpr".to_string(),
            Some(Framework::UkGdpr) => "uk_gdpr".to_string(),
            Some(Framework::Ccpa) => "ccpa".to_string(),
            None => "json".to_string(),
        },
    };

    match name.as_str() {
        "json" => Ok(Box::new(JsonExporter)),
        "gdpr" => Ok(Box::new(FrameworkExporter::gdpr())),
        "uk_gdpr" => Ok(Box::new(FrameworkExporter::uk_gdpr())),
        "ccpa" => Ok(Box::new(FrameworkExporter::ccpa())),
        other => Err(ExportError::Serialise(format!(
            "unknown exporter '{other}'; available: {}",
            available_exporters().join(", ")
        ))),
    }
}

/// Exporter names for `wct ls-exporters`.
#[must_use]
pub fn available_exporters() -> Vec<&'static str> {
    vec!["json", "gdpr", "uk_gdpr", "ccpa"]
}

fn canonical(value: &Value) -> Result<String, ExportError> {
    let bytes = serde_json_canonicalizer::to_vec(value)
        .map_err(|e| ExportError::Serialise(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Serialise(e.to_string()))
}

/// Count findings by risk level across every successful artifact message.
fn summarise(result: &ExecutionResult) -> Value {
    let mut total_findings = 0u64;
    let mut high_risk = 0u64;

    for artifact in result.artifacts.values() {
        let Some(message) = &artifact.message else {
            continue;
        };
        let Some(findings) = message.content().get("findings").and_then(Value::as_array) else {
            continue;
        };
        total_findings += findings.len() as u64;
        high_risk += findings
            .iter()
            .filter(|finding| finding.get("risk_level").and_then(Value::as_str) == Some("high"))
            .count() as u64;
    }

    json!({
        "artifacts_completed": result.artifacts.values().filter(|a| a.success).count(),
        "artifacts_failed": result.artifacts.values().filter(|a| !a.success).count(),
        "artifacts_skipped": result.skipped.len(),
        "total_findings": total_findings,
        "high_risk_findings": high_risk,
        "run_succeeded": result.succeeded(),
    })
}
