//! Command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use wct_export::{available_exporters, exporter_for};
use wct_llm::BatchResultPoller;
use wct_orchestration::{DagExecutor, ExecutionError, Planner};
use wct_rulesets::available_rulesets;
use wct_store::{ArtifactStore, RunStatus};

use crate::bootstrap;
use crate::exit_codes;

/// `wct run` - plan, execute, export.
pub async fn run(
    runbook: &Path,
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    exporter_name: Option<String>,
    resume: Option<String>,
) -> Result<i32> {
    let registry = bootstrap::build_registry()?;
    let planner = Planner::new(&registry);
    let plan = match planner.plan(runbook) {
        Ok(plan) => plan,
        Err(error) => {
            eprintln!("Planning failed: {error}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let exporter = match exporter_for(plan.runbook.framework, exporter_name.as_deref()) {
        Ok(exporter) => exporter,
        Err(error) => {
            eprintln!("{error}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let store = bootstrap::build_store()?;
    let services = bootstrap::build_services(Arc::clone(&store));
    let executor = DagExecutor::new(Arc::new(registry), services);

    let result = match executor.execute(&plan, resume.as_deref()).await {
        Ok(result) => result,
        Err(ExecutionError::Planning(error)) => {
            eprintln!("Planning failed: {error}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
        Err(error) => return Err(error.into()),
    };

    let report = exporter.export(&result)?;
    match (output, output_dir) {
        (Some(path), _) => {
            std::fs::write(&path, &report)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        (None, Some(dir)) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let path = dir.join(format!("{}.json", result.run_id));
            std::fs::write(&path, &report)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        (None, None) => println!("{report}"),
    }

    if result.pending {
        eprintln!(
            "Run {} paused: LLM batches submitted. Poll with `wct poll {}`, then resume with `wct run {} --resume {}`.",
            result.run_id,
            result.run_id,
            runbook.display(),
            result.run_id
        );
        return Ok(exit_codes::RUN_PAUSED);
    }
    if result.succeeded() {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::RUN_FAILED)
    }
}

/// `wct poll` - advance a paused run's batches.
pub async fn poll(run_id: &str) -> Result<i32> {
    let store = bootstrap::build_store()?;
    let Some(provider) = bootstrap::build_llm_provider() else {
        eprintln!("No LLM provider configured; set ANTHROPIC_API_KEY (or LLM_PROVIDER).");
        return Ok(exit_codes::CONFIG_ERROR);
    };

    let poller = BatchResultPoller::new(store, provider);
    let result = poller.poll_run(run_id).await?;

    for error in &result.errors {
        eprintln!("Warning: {error}");
    }
    println!(
        "completed: {}, failed: {}, pending: {}",
        result.completed, result.failed, result.pending
    );
    if result.pending == 0 && result.completed + result.failed > 0 {
        eprintln!("All batches resolved; resume the run with `wct run <runbook> --resume {run_id}`.");
    }

    Ok(exit_codes::SUCCESS)
}

/// `wct runs` - list runs, most recent first.
pub async fn runs(status: Option<&str>) -> Result<i32> {
    let filter = match status {
        None => None,
        Some("completed") => Some(RunStatus::Completed),
        Some("failed") => Some(RunStatus::Failed),
        Some("pending") => Some(RunStatus::Paused),
        Some("running") => Some(RunStatus::Running),
        Some(other) => {
            eprintln!("Unknown status '{other}'; expected completed, failed, or pending.");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let store = bootstrap::build_store()?;
    let runs = store.list_runs(filter).await?;

    if runs.is_empty() {
        println!("No runs found.");
        return Ok(exit_codes::SUCCESS);
    }
    for run in runs {
        println!(
            "{}  {:<9}  {}  {}",
            run.start_timestamp.format("%Y-%m-%d %H:%M:%S"),
            run.status.to_string(),
            run.run_id,
            run.runbook_path
        );
    }
    Ok(exit_codes::SUCCESS)
}

/// `wct validate-runbook` - plan without executing.
pub fn validate_runbook(runbook: &Path) -> Result<i32> {
    let registry = bootstrap::build_registry()?;
    match Planner::new(&registry).plan(runbook) {
        Ok(plan) => {
            println!(
                "Runbook '{}' is valid: {} artifact(s).",
                plan.runbook.name,
                plan.nodes.len()
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(error) => {
            eprintln!("Invalid runbook: {error}");
            Ok(exit_codes::CONFIG_ERROR)
        }
    }
}

pub fn ls_connectors() -> Result<i32> {
    let registry = bootstrap::build_registry()?;
    for name in registry.connector_names() {
        println!("{name}");
    }
    Ok(exit_codes::SUCCESS)
}

pub fn ls_processors() -> Result<i32> {
    let registry = bootstrap::build_registry()?;
    for name in registry.processor_names() {
        println!("{name}");
    }
    Ok(exit_codes::SUCCESS)
}

pub fn ls_exporters() -> Result<i32> {
    for name in available_exporters() {
        println!("{name}");
    }
    Ok(exit_codes::SUCCESS)
}

pub fn ls_rulesets() -> Result<i32> {
    for ruleset in available_rulesets() {
        println!(
            "local/{}/{}  {}",
            ruleset.name, ruleset.version, ruleset.description
        );
    }
    Ok(exit_codes::SUCCESS)
}
