//! Ruleset URIs of the form `{provider}/{name}/{version}`.

use crate::error::RulesetError;

/// Parsed ruleset URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetUri {
    pub provider: String,
    pub name: String,
    pub version: String,
}

impl RulesetUri {
    /// Parse `provider/name/version`, validating that the version is
    /// `MAJOR.MINOR.PATCH`.
    pub fn parse(uri: &str) -> Result<Self, RulesetError> {
        let parts: Vec<&str> = uri.split('/').collect();
        let [provider, name, version] = parts.as_slice() else {
            return Err(RulesetError::InvalidUri {
                uri: uri.to_string(),
            });
        };

        if provider.is_empty() || name.is_empty() || !is_semver(version) {
            return Err(RulesetError::InvalidUri {
                uri: uri.to_string(),
            });
        }

        Ok(Self {
            provider: (*provider).to_string(),
            name: (*name).to_string(),
            version: (*version).to_string(),
        })
    }
}

fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
