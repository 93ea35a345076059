//! Runbook planning and DAG execution.
//!
//! A declarative YAML runbook resolves into an [`ExecutionPlan`]: a
//! dependency graph of typed artifacts with per-artifact input and output
//! schemas. The [`DagExecutor`] drives the plan to completion under a
//! concurrency budget, persisting every artifact, the execution state, and
//! LLM cache entries, so a partially failed or batch-paused run can be
//! resumed.

mod dag;
mod error;
mod executor;
mod planner;
mod result;
mod runbook;
mod state;

pub use dag::{ExecutionDAG, ReadySorter};
pub use error::{ExecutionError, PlanningError};
pub use executor::DagExecutor;
pub use planner::{ArtifactSchemas, ExecutionPlan, NodeKind, PlannedNode, Planner};
pub use result::{ArtifactResult, ExecutionResult};
pub use runbook::{
    ArtifactDefinition, ChildRunbookConfig, Framework, InputDeclaration, Inputs, MergePolicy,
    OutputDeclaration, ProcessConfig, Runbook, RunbookConfig, SourceConfig,
};
pub use state::ExecutionState;

/// Storage key for an artifact's message.
#[must_use]
pub fn artifact_key(artifact_id: &str) -> String {
    format!("artifacts/{artifact_id}")
}
