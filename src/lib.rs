//! wct - the Waivern Compliance Tool.
//!
//! A data-compliance analysis engine: declarative YAML runbooks resolve
//! into a DAG of typed artifacts, executed with resume and batch-LLM
//! pause/poll semantics, producing framework-specific compliance reports.

pub mod bootstrap;
pub mod cli;
pub mod exit_codes;
pub mod logging;

pub use cli::Cli;
