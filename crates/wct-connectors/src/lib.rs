//! Data-source connectors.
//!
//! Connectors extract content from external systems into
//! `standard_input/1.0.0` messages. Database and repository connectors plug
//! in through the same factory interface; the filesystem connector bundled
//! here is the reference implementation.

mod filesystem;

pub use filesystem::{FilesystemConnector, FilesystemConnectorFactory};
