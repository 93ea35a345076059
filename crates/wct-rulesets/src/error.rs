use thiserror::Error;

/// Errors raised while resolving and loading rulesets.
#[derive(Error, Debug)]
pub enum RulesetError {
    #[error("Invalid ruleset URI '{uri}': expected 'provider/name/version'")]
    InvalidUri { uri: String },

    #[error("Unsupported ruleset provider '{provider}'. Supported providers: local")]
    UnsupportedProvider { provider: String },

    #[error("Ruleset '{name}/{version}' is not bundled with this build")]
    NotFound { name: String, version: String },

    #[error("Ruleset '{name}/{version}' failed to parse: {reason}")]
    Parse {
        name: String,
        version: String,
        reason: String,
    },

    #[error("Ruleset '{name}/{version}' was already loaded with a different rule type")]
    RuleTypeMismatch { name: String, version: String },

    #[error(
        "Ruleset document '{name}/{version}' declares itself as '{declared_name}/{declared_version}'"
    )]
    IdentityMismatch {
        name: String,
        version: String,
        declared_name: String,
        declared_version: String,
    },
}
