//! Registry of rulesets bundled with this build.

/// A bundled ruleset: identity plus the embedded YAML document.
#[derive(Debug, Clone, Copy)]
pub struct RulesetInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub(crate) yaml: &'static str,
}

static BUNDLED: &[RulesetInfo] = &[
    RulesetInfo {
        name: "personal_data",
        version: "1.0.0",
        description: "Personal data categories in stored and transmitted content",
        yaml: include_str!("../data/personal_data_1.0.0.yaml"),
    },
    RulesetInfo {
        name: "data_subjects",
        version: "1.0.0",
        description: "Categories of natural persons whose data is processed",
        yaml: include_str!("../data/data_subjects_1.0.0.yaml"),
    },
    RulesetInfo {
        name: "processing_purposes",
        version: "1.0.0",
        description: "Purposes of personal-data processing in code and configuration",
        yaml: include_str!("../data/processing_purposes_1.0.0.yaml"),
    },
    RulesetInfo {
        name: "service_integrations",
        version: "1.0.0",
        description: "Third-party service integrations that receive personal data",
        yaml: include_str!("../data/service_integrations_1.0.0.yaml"),
    },
];

/// All rulesets bundled with this build, for `wct ls-rulesets`.
#[must_use]
pub fn available_rulesets() -> &'static [RulesetInfo] {
    BUNDLED
}

pub(crate) fn find(name: &str, version: &str) -> Option<&'static RulesetInfo> {
    BUNDLED
        .iter()
        .find(|info| info.name == name && info.version == version)
}
