//! Exit code constants for the CLI.

/// Run completed successfully.
pub const SUCCESS: i32 = 0;

/// Run executed but failed (failed or skipped artifacts).
pub const RUN_FAILED: i32 = 1;

/// Run paused with LLM batches pending; poll, then resume.
pub const RUN_PAUSED: i32 = 2;

/// Configuration or planning error; nothing executed.
pub const CONFIG_ERROR: i32 = 3;
