//! Component registry, factories, and the service container.
//!
//! A component `type` string in a runbook resolves through the registry to
//! a factory, which validates the typed configuration and instantiates the
//! connector or processor with its service dependencies injected. The
//! registry is built once at startup and read-only afterwards.

mod container;
mod factory;
mod registry;

pub use container::ServiceContainer;
pub use factory::{ConnectorFactory, ProcessorFactory, reject_unknown_keys};
pub use registry::ComponentRegistry;
