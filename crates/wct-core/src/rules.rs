//! Rule and ruleset value types.
//!
//! Rules are framework-agnostic: compliance framework association comes
//! from ruleset naming and runbook configuration, not from rule fields.

use serde::{Deserialize, Deserializer, Serialize};

use crate::finding::RiskLevel;

/// Common properties shared by every rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub risk_level: RiskLevel,
}

/// Pattern-based rule used by analysers to detect content in text.
///
/// `patterns` match with case-insensitive word boundaries; `value_patterns`
/// are regexes applied verbatim (service endpoints, identifiers with fixed
/// shapes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRule {
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_patterns: Vec<String>,
}

impl DetectionRule {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.rule.name
    }

    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.rule.risk_level
    }

    /// A rule is usable when it carries at least one non-empty pattern of
    /// either kind.
    #[must_use]
    pub fn has_patterns(&self) -> bool {
        self.patterns.iter().any(|p| !p.trim().is_empty())
            || self.value_patterns.iter().any(|p| !p.trim().is_empty())
    }
}

/// A named, versioned collection of rules, as parsed from ruleset YAML.
#[derive(Debug, Clone, Serialize)]
pub struct RulesetData<R> {
    pub name: String,
    pub version: String,
    pub description: String,
    pub rules: Vec<R>,
}

impl<'de, R> Deserialize<'de> for RulesetData<R>
where
    R: Deserialize<'de> + RuleName,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw<R> {
            name: String,
            version: String,
            description: String,
            rules: Vec<R>,
        }

        let raw = Raw::<R>::deserialize(deserializer)?;

        if raw.rules.is_empty() {
            return Err(serde::de::Error::custom(format!(
                "ruleset '{}' contains no rules",
                raw.name
            )));
        }

        if !is_semver(&raw.version) {
            return Err(serde::de::Error::custom(format!(
                "ruleset '{}' version '{}' is not MAJOR.MINOR.PATCH",
                raw.name, raw.version
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &raw.rules {
            if !seen.insert(rule.rule_name().to_string()) {
                return Err(serde::de::Error::custom(format!(
                    "duplicate rule name '{}' in ruleset '{}'",
                    rule.rule_name(),
                    raw.name
                )));
            }
        }

        Ok(Self {
            name: raw.name,
            version: raw.version,
            description: raw.description,
            rules: raw.rules,
        })
    }
}

/// Access to a rule's unique name, required for uniqueness validation at
/// ruleset load time.
pub trait RuleName {
    fn rule_name(&self) -> &str;
}

impl RuleName for DetectionRule {
    fn rule_name(&self) -> &str {
        self.name()
    }
}

fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
