//! Compliance analysers: pattern-based detection over standard input data,
//! with optional LLM validation to weed out false positives.

mod config;
mod data_subject;
mod input;
mod personal_data;
mod processing_purpose;
mod validation;

pub use config::{AnalyserConfig, BatchingModeConfig, LlmValidationConfig};
pub use data_subject::{DataSubjectAnalyserFactory, DataSubjectFinding};
pub use input::{StandardInputItem, parse_standard_input};
pub use personal_data::{PersonalDataAnalyserFactory, PersonalDataFinding};
pub use processing_purpose::{ProcessingPurposeAnalyserFactory, ProcessingPurposeFinding};
pub use validation::{FindingValidationResponse, FindingVerdict, ValidationOutcome};
