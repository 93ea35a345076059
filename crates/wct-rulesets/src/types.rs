//! Domain-specific rule types layered over the core detection rule.

use serde::{Deserialize, Serialize};

use wct_core::DetectionRule;
use wct_core::rules::RuleName;

/// Personal-data detection rule; `special_category` marks categories
/// requiring heightened handling (GDPR Article 9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalDataRule {
    #[serde(flatten)]
    pub detection: DetectionRule,
    #[serde(default)]
    pub special_category: bool,
}

impl RuleName for PersonalDataRule {
    fn rule_name(&self) -> &str {
        self.detection.name()
    }
}

/// Data-subject category detection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSubjectRule {
    #[serde(flatten)]
    pub detection: DetectionRule,
}

impl RuleName for DataSubjectRule {
    fn rule_name(&self) -> &str {
        self.detection.name()
    }
}

/// Processing-purpose (and service-integration) detection rule, classified
/// into a purpose category such as `marketing` or `analytics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingPurposeRule {
    #[serde(flatten)]
    pub detection: DetectionRule,
    pub purpose_category: String,
}

impl RuleName for ProcessingPurposeRule {
    fn rule_name(&self) -> &str {
        self.detection.name()
    }
}
