//! Command-line interface.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::exit_codes;

/// Waivern Compliance Tool: run declarative compliance runbooks against
/// your data sources and produce framework-specific reports.
#[derive(Parser, Debug)]
#[command(name = "wct", version, about)]
pub struct Cli {
    /// Log level filter (e.g. `info`, `wct=debug`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a runbook.
    Run {
        /// Path to the runbook YAML file.
        runbook: PathBuf,

        /// Write the report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the report to `{output_dir}/{run_id}.json`.
        #[arg(long, conflicts_with = "output")]
        output_dir: Option<PathBuf>,

        /// Exporter override (`json`, `gdpr`, `uk_gdpr`, `ccpa`).
        #[arg(long)]
        exporter: Option<String>,

        /// Resume a paused or partially failed run by id.
        #[arg(long)]
        resume: Option<String>,
    },

    /// Poll pending LLM batches for a paused run.
    Poll {
        /// The run id to poll.
        run_id: String,
    },

    /// List known runs from the artifact store.
    Runs {
        /// Filter by status: completed, failed, or pending.
        #[arg(long)]
        status: Option<String>,
    },

    /// Validate a runbook without executing it.
    ValidateRunbook {
        /// Path to the runbook YAML file.
        runbook: PathBuf,
    },

    /// List registered connector types.
    LsConnectors,

    /// List registered processor types.
    LsProcessors,

    /// List available exporters.
    LsExporters,

    /// List bundled rulesets.
    LsRulesets,
}

/// Dispatch a parsed CLI invocation; returns the process exit code.
pub async fn execute(cli: Cli) -> i32 {
    let outcome = match cli.command {
        Commands::Run {
            runbook,
            output,
            output_dir,
            exporter,
            resume,
        } => commands::run(&runbook, output, output_dir, exporter, resume).await,
        Commands::Poll { run_id } => commands::poll(&run_id).await,
        Commands::Runs { status } => commands::runs(status.as_deref()).await,
        Commands::ValidateRunbook { runbook } => commands::validate_runbook(&runbook),
        Commands::LsConnectors => commands::ls_connectors(),
        Commands::LsProcessors => commands::ls_processors(),
        Commands::LsExporters => commands::ls_exporters(),
        Commands::LsRulesets => commands::ls_rulesets(),
    };

    match outcome {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error:#}");
            exit_codes::RUN_FAILED
        }
    }
}
