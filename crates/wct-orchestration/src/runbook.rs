//! The declarative runbook model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PlanningError;

/// Compliance framework selecting the report exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    #[serde(rename = "GDPR")]
    Gdpr,
    #[serde(rename = "UK_GDPR")]
    UkGdpr,
    #[serde(rename = "CCPA")]
    Ccpa,
}

/// Run-level execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunbookConfig {
    /// Total wall-clock bound for the run, in seconds.
    pub timeout: u64,
    /// Maximum artifacts in flight at once.
    pub max_concurrency: usize,
    /// Maximum child-runbook nesting depth.
    pub max_child_depth: usize,
}

impl Default for RunbookConfig {
    fn default() -> Self {
        Self {
            timeout: 300,
            max_concurrency: 10,
            max_child_depth: 3,
        }
    }
}

/// Declaration of an expected input, making the runbook usable as a child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDeclaration {
    /// Schema reference (`name/version`) the mapped artifact must produce.
    pub input_schema: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<Value>,
    /// Sensitive values are redacted from logs and exports.
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Declaration of an output a child runbook exposes to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDeclaration {
    /// The artifact in this runbook backing the output.
    pub artifact: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Connector configuration for a source artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Processor configuration for a derived artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Composition directive inlining another runbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRunbookConfig {
    /// Path to the child runbook, relative to the parent runbook file.
    pub path: String,
    /// Maps child input names to parent artifact ids.
    pub input_mapping: BTreeMap<String, String>,
    /// Single child output (by declared output name) aliased to this
    /// artifact's id. Mutually exclusive with `output_mapping`.
    #[serde(default)]
    pub output: Option<String>,
    /// Multiple outputs: child declared output name to parent artifact id.
    #[serde(default)]
    pub output_mapping: Option<BTreeMap<String, String>>,
}

/// One artifact id or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inputs {
    One(String),
    Many(Vec<String>),
}

impl Inputs {
    /// Input ids in declaration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id.clone()],
            Self::Many(ids) => ids.clone(),
        }
    }
}

/// Policy for combining fan-in inputs into one logical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Concatenate,
}

/// How one artifact is produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDefinition {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub inputs: Option<Inputs>,
    #[serde(default)]
    pub process: Option<ProcessConfig>,
    #[serde(default)]
    pub child_runbook: Option<ChildRunbookConfig>,
    #[serde(default)]
    pub merge: Option<MergePolicy>,
    /// Override of the component's default output schema (`name/version`).
    #[serde(default)]
    pub output_schema: Option<String>,
    /// Marks the artifact as a final output of the run.
    #[serde(default)]
    pub output: bool,
    /// Failure of an optional artifact does not fail its dependents
    /// outright; they run on whatever inputs completed.
    #[serde(default)]
    pub optional: bool,
}

/// The declarative input: a named set of artifact definitions, acyclic by
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runbook {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub framework: Option<Framework>,
    #[serde(default)]
    pub config: RunbookConfig,
    #[serde(default)]
    pub inputs: Option<BTreeMap<String, InputDeclaration>>,
    #[serde(default)]
    pub outputs: Option<BTreeMap<String, OutputDeclaration>>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactDefinition>,
}

impl Runbook {
    /// Parse a runbook from YAML and validate its structure.
    pub fn from_yaml(yaml: &str) -> Result<Self, PlanningError> {
        let runbook: Self =
            serde_yaml::from_str(yaml).map_err(|e| PlanningError::Invalid(e.to_string()))?;
        runbook.validate()?;
        Ok(runbook)
    }

    /// Structural validation independent of the component registry.
    pub fn validate(&self) -> Result<(), PlanningError> {
        for (artifact_id, definition) in &self.artifacts {
            definition.validate(artifact_id)?;
        }

        if let Some(outputs) = &self.outputs {
            for (output_name, declaration) in outputs {
                if !self.artifacts.contains_key(&declaration.artifact) {
                    return Err(PlanningError::Invalid(format!(
                        "output '{output_name}' references non-existent artifact '{}'",
                        declaration.artifact
                    )));
                }
            }
        }

        if let Some(inputs) = &self.inputs {
            for (input_name, declaration) in inputs {
                if declaration.default.is_some() && !declaration.optional {
                    return Err(PlanningError::Invalid(format!(
                        "input '{input_name}': 'default' requires 'optional: true'"
                    )));
                }
            }

            // A runbook with declared inputs receives its data from the
            // parent; it cannot also pull from external sources.
            for (artifact_id, definition) in &self.artifacts {
                if definition.source.is_some() {
                    return Err(PlanningError::Invalid(format!(
                        "runbook with declared inputs cannot have source artifacts (found in '{artifact_id}')"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Declared input names that must be mapped by a parent.
    #[must_use]
    pub fn required_input_names(&self) -> Vec<String> {
        self.inputs
            .as_ref()
            .map(|inputs| {
                inputs
                    .iter()
                    .filter(|(_, declaration)| !declaration.optional)
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ArtifactDefinition {
    fn validate(&self, artifact_id: &str) -> Result<(), PlanningError> {
        let modes = [
            self.source.is_some(),
            self.inputs.is_some(),
            self.child_runbook.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();

        if modes == 0 {
            return Err(PlanningError::Invalid(format!(
                "artifact '{artifact_id}' must define one of 'source', 'inputs', or 'child_runbook'"
            )));
        }
        if modes > 1 {
            return Err(PlanningError::Invalid(format!(
                "artifact '{artifact_id}' defines more than one of 'source', 'inputs', and 'child_runbook'; they are mutually exclusive"
            )));
        }

        if self.inputs.is_some() && self.process.is_none() {
            return Err(PlanningError::Invalid(format!(
                "artifact '{artifact_id}' has 'inputs' but no 'process'"
            )));
        }
        if self.process.is_some() && self.inputs.is_none() {
            return Err(PlanningError::Invalid(format!(
                "artifact '{artifact_id}' has 'process' but no 'inputs'"
            )));
        }
        if self.merge.is_some() && self.inputs.is_none() {
            return Err(PlanningError::Invalid(format!(
                "artifact '{artifact_id}' has 'merge' but no 'inputs'"
            )));
        }

        if let Some(child) = &self.child_runbook {
            match (&child.output, &child.output_mapping) {
                (None, None) => {
                    return Err(PlanningError::Invalid(format!(
                        "artifact '{artifact_id}': child_runbook requires 'output' or 'output_mapping'"
                    )));
                }
                (Some(_), Some(_)) => {
                    return Err(PlanningError::Invalid(format!(
                        "artifact '{artifact_id}': child_runbook cannot have both 'output' and 'output_mapping'"
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
