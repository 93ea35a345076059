//! Concrete provider implementations.

pub mod anthropic;
