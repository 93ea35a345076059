//! Drives an execution plan to completion under a concurrency budget.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wct_component::{ComponentRegistry, ServiceContainer};
use wct_core::{Message, ProcessContext, ProcessOutcome};
use wct_store::{ArtifactStore, RunMetadata, RunStatus};

use crate::artifact_key;
use crate::error::{ExecutionError, PlanningError};
use crate::planner::{ArtifactSchemas, ExecutionPlan, NodeKind, PlannedNode};
use crate::result::{ArtifactResult, ExecutionResult};
use crate::runbook::MergePolicy;
use crate::state::ExecutionState;

/// Outcome of one artifact task.
enum TaskOutcome {
    Completed(Message),
    /// Asynchronous LLM work was submitted; the artifact stays
    /// `not_started` and the run pauses.
    Pending,
    Failed(String),
}

/// Executes plans: dispatches ready artifacts as cooperative tasks,
/// persists every artifact and state transition, and supports resuming a
/// partially completed or batch-paused run.
pub struct DagExecutor {
    registry: Arc<ComponentRegistry>,
    services: ServiceContainer,
    cancelled: Arc<AtomicBool>,
}

impl DagExecutor {
    pub fn new(registry: Arc<ComponentRegistry>, services: ServiceContainer) -> Self {
        Self {
            registry,
            services,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for cooperative cancellation: running artifact tasks finish,
    /// nothing new is dispatched, and the run is left resumable.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Execute a plan, optionally resuming an earlier run.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        resume_run_id: Option<&str>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let store = self.services.store();

        let (run_id, mut state) = match resume_run_id {
            Some(run_id) => {
                let metadata = store.load_run_metadata(run_id).await?.ok_or_else(|| {
                    ExecutionError::RunNotFound {
                        run_id: run_id.to_string(),
                    }
                })?;
                if metadata.runbook_hash != plan.runbook_hash {
                    return Err(PlanningError::RunbookHashMismatch {
                        run_id: run_id.to_string(),
                    }
                    .into());
                }
                let mut state = ExecutionState::load(store.as_ref(), run_id).await?;
                state.reset_for_resume();
                info!(
                    run_id = %run_id,
                    completed = state.completed.len(),
                    remaining = state.not_started.len(),
                    "Resuming run"
                );
                (run_id.to_string(), state)
            }
            None => {
                let run_id = Uuid::new_v4().to_string();
                let metadata = RunMetadata {
                    run_id: run_id.clone(),
                    runbook_path: plan.runbook_path.clone(),
                    runbook_hash: plan.runbook_hash.clone(),
                    start_timestamp: Utc::now(),
                    status: RunStatus::Running,
                };
                store.save_run_metadata(&run_id, &metadata).await?;
                info!(run_id = %run_id, runbook = %plan.runbook.name, "Starting run");
                (run_id.clone(), ExecutionState::fresh(&run_id, plan.dag.node_ids()))
            }
        };
        state.save(store.as_ref()).await?;

        let start_timestamp = Utc::now();
        let started = Instant::now();
        let deadline = started + Duration::from_secs(plan.runbook.config.timeout);
        let max_concurrency = plan.runbook.config.max_concurrency.max(1);

        let mut sorter = plan.dag.sorter();
        for completed in &state.completed {
            sorter.done(completed);
        }

        let mut ready: VecDeque<String> = sorter
            .take_ready()
            .into_iter()
            .filter(|id| !state.completed.contains(id))
            .collect();
        let mut results: BTreeMap<String, ArtifactResult> = BTreeMap::new();
        let mut pending_run = false;
        let mut join_set: JoinSet<(String, TaskOutcome, f64)> = JoinSet::new();

        loop {
            // Dispatch up to the concurrency budget. Artifacts whose
            // surviving inputs are all gone are skipped here, which
            // cascades the skip through their dependents.
            while join_set.len() < max_concurrency && !self.cancelled.load(Ordering::Relaxed) {
                let Some(artifact_id) = ready.pop_front() else {
                    break;
                };
                let node = &plan.nodes[&artifact_id];

                let available_inputs = available_inputs(node, &state);
                let has_dependencies = !plan.dag.get_dependencies(&artifact_id).is_empty();
                if has_dependencies && available_inputs.is_empty() {
                    debug!(
                        run_id = %run_id,
                        artifact_id = %artifact_id,
                        "Skipping artifact: no completed inputs"
                    );
                    state.mark_skipped(&[artifact_id.clone()].into());
                    state.save(store.as_ref()).await?;
                    sorter.done(&artifact_id);
                    ready.extend(sorter.take_ready());
                    continue;
                }

                let remaining = deadline.saturating_duration_since(Instant::now());
                let task = ArtifactTask {
                    registry: Arc::clone(&self.registry),
                    services: self.services.clone(),
                    store: Arc::clone(&store),
                    run_id: run_id.clone(),
                    artifact_id: artifact_id.clone(),
                    node: node.clone(),
                    schemas: plan.schemas[&artifact_id].clone(),
                    available_inputs,
                };
                join_set.spawn(async move {
                    let task_started = Instant::now();
                    let artifact_id = task.artifact_id.clone();
                    let outcome = match tokio::time::timeout(remaining, task.run()).await {
                        Ok(outcome) => outcome,
                        Err(_) => TaskOutcome::Failed(format!(
                            "Operation timed out after {}s",
                            remaining.as_secs()
                        )),
                    };
                    (artifact_id, outcome, task_started.elapsed().as_secs_f64())
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (artifact_id, outcome, duration) = match joined {
                Ok(completed) => completed,
                Err(join_error) => {
                    error!(error = %join_error, "Artifact task aborted");
                    continue;
                }
            };
            let node = &plan.nodes[&artifact_id];

            match outcome {
                TaskOutcome::Completed(message) => {
                    debug!(run_id = %run_id, artifact_id = %artifact_id, "Artifact completed");
                    state.mark_completed(&artifact_id);
                    state.save(store.as_ref()).await?;

                    let mut result = ArtifactResult::succeeded(&artifact_id, message, duration)
                        .with_origin(&node.origin);
                    if let NodeKind::Alias { target } = &node.kind {
                        result = result.with_alias(target);
                    }
                    results.insert(artifact_id.clone(), result);

                    sorter.done(&artifact_id);
                    ready.extend(sorter.take_ready());
                }
                TaskOutcome::Pending => {
                    info!(
                        run_id = %run_id,
                        artifact_id = %artifact_id,
                        "Artifact paused awaiting batch results"
                    );
                    pending_run = true;
                    // Stays not_started; dependents stay blocked.
                    sorter.abandon(&artifact_id);
                }
                TaskOutcome::Failed(error_text) => {
                    warn!(
                        run_id = %run_id,
                        artifact_id = %artifact_id,
                        error = %error_text,
                        "Artifact failed"
                    );
                    state.mark_failed(&artifact_id);
                    results.insert(
                        artifact_id.clone(),
                        ArtifactResult::failed(&artifact_id, error_text, duration)
                            .with_origin(&node.origin),
                    );

                    if node.optional {
                        // Dependents continue; they see the artifact missing.
                        sorter.done(&artifact_id);
                        ready.extend(sorter.take_ready());
                    } else {
                        let descendants = plan.dag.descendants(&artifact_id);
                        state.mark_skipped(&descendants);
                        for descendant in &descendants {
                            sorter.abandon(descendant);
                        }
                        sorter.abandon(&artifact_id);
                    }
                    state.save(store.as_ref()).await?;
                }
            }
        }

        let cancelled = self.cancelled.load(Ordering::Relaxed);
        if !pending_run && !cancelled {
            // Anything still unvisited is unreachable work behind a failure.
            let leftover = state.not_started.clone();
            state.mark_skipped(&leftover);
        }
        state.save(store.as_ref()).await?;

        let status = if pending_run || cancelled {
            RunStatus::Paused
        } else if state.failed.is_empty() && state.skipped.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };

        if let Some(mut metadata) = store.load_run_metadata(&run_id).await? {
            metadata.status = status;
            store.save_run_metadata(&run_id, &metadata).await?;
        }

        if status == RunStatus::Completed {
            store.cache_clear(&run_id).await?;
        }

        info!(
            run_id = %run_id,
            status = %status,
            completed = state.completed.len(),
            failed = state.failed.len(),
            skipped = state.skipped.len(),
            "Run finished"
        );

        Ok(ExecutionResult {
            run_id,
            start_timestamp,
            artifacts: results,
            skipped: state.skipped.clone(),
            pending: pending_run,
            total_duration_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

/// Inputs of a node that actually completed, in declaration order.
fn available_inputs(node: &PlannedNode, state: &ExecutionState) -> Vec<String> {
    match &node.kind {
        NodeKind::Source { .. } => Vec::new(),
        NodeKind::Derived { inputs, .. } => inputs
            .iter()
            .filter(|input| state.completed.contains(*input))
            .cloned()
            .collect(),
        NodeKind::Alias { target } => {
            if state.completed.contains(target) {
                vec![target.clone()]
            } else {
                Vec::new()
            }
        }
    }
}

/// Everything one artifact task needs, owned so it can move into a spawn.
struct ArtifactTask {
    registry: Arc<ComponentRegistry>,
    services: ServiceContainer,
    store: Arc<dyn ArtifactStore>,
    run_id: String,
    artifact_id: String,
    node: PlannedNode,
    schemas: ArtifactSchemas,
    available_inputs: Vec<String>,
}

impl ArtifactTask {
    async fn run(self) -> TaskOutcome {
        match self.execute().await {
            Ok(outcome) => outcome,
            Err(error) => TaskOutcome::Failed(error),
        }
    }

    async fn execute(&self) -> Result<TaskOutcome, String> {
        match &self.node.kind {
            NodeKind::Source { config } => {
                let factory = self
                    .registry
                    .connector(&config.component_type)
                    .ok_or_else(|| {
                        format!("unknown connector type '{}'", config.component_type)
                    })?;
                let connector = factory
                    .create(&config.properties, &self.services)
                    .map_err(|e| e.to_string())?;

                let message = connector
                    .extract(&self.schemas.output)
                    .await
                    .map_err(|e| e.to_string())?
                    .with_run_id(&self.run_id);
                self.validate_and_save(message).await
            }
            NodeKind::Derived { process, merge, .. } => {
                let mut messages = Vec::new();
                for input_id in &self.available_inputs {
                    let message = self
                        .store
                        .get(&self.run_id, &artifact_key(input_id))
                        .await
                        .map_err(|e| e.to_string())?;
                    messages.push(message);
                }

                let inputs = if messages.len() > 1 {
                    match merge {
                        MergePolicy::Concatenate => {
                            vec![merge_concatenate(&self.artifact_id, &messages)]
                        }
                    }
                } else {
                    messages
                };

                let factory = self
                    .registry
                    .processor(&process.component_type)
                    .ok_or_else(|| {
                        format!("unknown processor type '{}'", process.component_type)
                    })?;
                let processor = factory
                    .create(&process.properties, &self.services)
                    .map_err(|e| e.to_string())?;

                let ctx = ProcessContext {
                    run_id: self.run_id.clone(),
                    artifact_id: self.artifact_id.clone(),
                };
                match processor
                    .process(&inputs, &self.schemas.output, &ctx)
                    .await
                    .map_err(|e| e.to_string())?
                {
                    ProcessOutcome::Completed(message) => {
                        self.validate_and_save(message.with_run_id(&self.run_id)).await
                    }
                    ProcessOutcome::Pending { .. } => Ok(TaskOutcome::Pending),
                }
            }
            NodeKind::Alias { target } => {
                let message = self
                    .store
                    .get(&self.run_id, &artifact_key(target))
                    .await
                    .map_err(|e| e.to_string())?;
                self.store
                    .save(&self.run_id, &artifact_key(&self.artifact_id), &message)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(TaskOutcome::Completed(message))
            }
        }
    }

    async fn validate_and_save(&self, message: Message) -> Result<TaskOutcome, String> {
        message.validate().map_err(|e| e.to_string())?;
        self.store
            .save(&self.run_id, &artifact_key(&self.artifact_id), &message)
            .await
            .map_err(|e| e.to_string())?;
        Ok(TaskOutcome::Completed(message))
    }
}

/// Merge fan-in messages into one logical input.
///
/// `findings` arrays are concatenated in input order, keeping the earliest
/// occurrence of each finding id; `data` arrays are concatenated as-is.
/// Remaining fields keep the first message's values.
fn merge_concatenate(artifact_id: &str, messages: &[Message]) -> Message {
    let schema = messages[0].schema().clone();
    let mut merged = messages[0].content().clone();

    let mut seen_ids: HashSet<String> = merged
        .get("findings")
        .and_then(Value::as_array)
        .map(|findings| {
            findings
                .iter()
                .filter_map(|f| f.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    for message in &messages[1..] {
        for key in ["findings", "data"] {
            let Some(items) = message.content().get(key).and_then(Value::as_array) else {
                continue;
            };
            let Some(target) = merged.get_mut(key).and_then(Value::as_array_mut) else {
                continue;
            };
            for item in items {
                if key == "findings"
                    && let Some(id) = item.get("id").and_then(Value::as_str)
                    && !seen_ids.insert(id.to_string())
                {
                    continue;
                }
                target.push(item.clone());
            }
        }
    }

    Message::new(format!("{artifact_id}-input"), merged, schema)
}
