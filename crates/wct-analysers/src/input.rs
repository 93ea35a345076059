//! Decoding of `standard_input` messages at the analyser boundary.

use serde_json::Value;

use wct_core::{ComponentError, Message};

/// One data item from a standard input message.
#[derive(Debug, Clone)]
pub struct StandardInputItem {
    pub content: String,
    pub source: String,
}

/// Decode the `data` items of a `standard_input` message.
pub fn parse_standard_input(message: &Message) -> Result<Vec<StandardInputItem>, ComponentError> {
    let data = message
        .content()
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ComponentError::Processing("input message has no 'data' array".to_string())
        })?;

    let mut items = Vec::with_capacity(data.len());
    for entry in data {
        let content = entry
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::Processing("data item has no string 'content'".to_string())
            })?;
        let source = entry
            .get("metadata")
            .and_then(|metadata| metadata.get("source"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ComponentError::Processing("data item has no 'metadata.source'".to_string())
            })?;
        items.push(StandardInputItem {
            content: content.to_string(),
            source: source.to_string(),
        });
    }
    Ok(items)
}

/// Stable finding identity from what was found and where.
///
/// Resume re-runs an analyser from scratch; ids (and therefore validation
/// prompts and cache keys) must come out identical, so they are derived
/// from the finding's content rather than generated randomly.
pub(crate) fn finding_id(
    artifact_id: &str,
    source: &str,
    label: &str,
    patterns: &[wct_core::MatchedPattern],
) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [artifact_id, source, label] {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    for pattern in patterns {
        hasher.update(pattern.pattern.as_bytes());
        hasher.update(pattern.match_count.to_le_bytes().as_slice());
        hasher.update(b"\x1f");
    }
    hasher.finalize().to_hex()[..32].to_string()
}

/// Assemble an analyser output document.
pub(crate) fn analysis_output<F: serde::Serialize>(
    findings: &[F],
    high_risk_count: usize,
    ruleset_used: &str,
    llm_validation_enabled: bool,
) -> Value {
    serde_json::json!({
        "findings": findings,
        "summary": {
            "total_findings": findings.len(),
            "high_risk_count": high_risk_count,
        },
        "analysis_metadata": {
            "ruleset_used": ruleset_used,
            "llm_validation_enabled": llm_validation_enabled,
            "analysis_timestamp": chrono::Utc::now().to_rfc3339(),
        },
    })
}
