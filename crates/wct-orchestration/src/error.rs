use thiserror::Error;

use wct_core::SchemaError;
use wct_store::StoreError;

/// Errors raised while resolving a runbook into an execution plan.
///
/// Any planning error aborts the run before anything executes.
#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("Failed to read runbook '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Runbook '{path}' is malformed: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid runbook: {0}")]
    Invalid(String),

    #[error("Cycle detected among artifacts: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    #[error("Artifact '{artifact_id}' references unknown input '{input_id}'")]
    UnknownInput {
        artifact_id: String,
        input_id: String,
    },

    #[error("Unknown component type '{component_type}' for artifact '{artifact_id}'")]
    UnknownComponentType {
        artifact_id: String,
        component_type: String,
    },

    #[error("Invalid configuration for artifact '{artifact_id}' ({component_type}): {reason}")]
    ComponentConfig {
        artifact_id: String,
        component_type: String,
        reason: String,
    },

    #[error(
        "Artifact '{artifact_id}': input schema '{found}' is not accepted by '{component_type}' (accepts {accepted})"
    )]
    InputSchemaMismatch {
        artifact_id: String,
        component_type: String,
        found: String,
        accepted: String,
    },

    #[error("Fan-in artifact '{artifact_id}' mixes input schemas ({first} vs {second}); 'concatenate' requires identical schemas")]
    FanInSchemaMismatch {
        artifact_id: String,
        first: String,
        second: String,
    },

    #[error("Child runbook nesting exceeds the limit of {limit}")]
    ChildDepthExceeded { limit: usize },

    #[error("Child runbook '{path}': {reason}")]
    ChildRunbook { path: String, reason: String },

    #[error("Runbook hash mismatch: run '{run_id}' was started from a different runbook")]
    RunbookHashMismatch { run_id: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors that abort a run as a whole.
///
/// Per-artifact component failures are not errors at this level; they are
/// recorded in the [`ExecutionResult`](crate::ExecutionResult) and
/// propagate by skipping descendants.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No execution state found for run '{run_id}'")]
    StateNotFound { run_id: String },

    #[error("No run metadata found for run '{run_id}'")]
    RunNotFound { run_id: String },
}
