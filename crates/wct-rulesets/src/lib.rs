//! Bundled compliance rulesets and the URI-based loader.
//!
//! Rulesets are addressed as `{provider}/{name}/{version}`. Only the
//! `local` provider exists today: its rulesets are YAML documents packaged
//! with the tool. Rulesets are immutable and loaded once per
//! `(name, version)` for the lifetime of the process.

mod error;
mod loader;
mod registry;
mod types;
mod uri;

pub use error::RulesetError;
pub use loader::load_ruleset;
pub use registry::{RulesetInfo, available_rulesets};
pub use types::{DataSubjectRule, PersonalDataRule, ProcessingPurposeRule};
pub use uri::RulesetUri;

/// URI of the bundled personal-data detection ruleset.
pub const PERSONAL_DATA_RULESET: &str = "local/personal_data/1.0.0";

/// URI of the bundled data-subject detection ruleset.
pub const DATA_SUBJECTS_RULESET: &str = "local/data_subjects/1.0.0";

/// URI of the bundled processing-purpose detection ruleset.
pub const PROCESSING_PURPOSES_RULESET: &str = "local/processing_purposes/1.0.0";

/// URI of the bundled third-party service integration ruleset.
pub const SERVICE_INTEGRATIONS_RULESET: &str = "local/service_integrations/1.0.0";
