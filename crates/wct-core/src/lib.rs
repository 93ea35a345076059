//! Core types shared across the Waivern Compliance Tool.
//!
//! This crate defines the data model that crosses component boundaries:
//! schema descriptors with embedded JSON Schema definitions, the `Message`
//! payload exchanged between connectors and processors, finding and rule
//! value types, and the component traits implemented by connectors and
//! analysers.

pub mod component;
pub mod error;
pub mod finding;
pub mod message;
pub mod rules;
pub mod schema;

pub use component::{Connector, ProcessContext, ProcessOutcome, Processor};
pub use error::{ComponentError, SchemaError, SchemaValidationError};
pub use finding::{Evidence, FindingMetadata, MatchedPattern, RiskLevel};
pub use message::Message;
pub use rules::{DetectionRule, Rule, RulesetData};
pub use schema::Schema;
