//! Stable exit codes for `taskbot` CLI commands.

/// Command succeeded and, for `run`, the task completed.
pub const OK: i32 = 0;
/// Invalid input: malformed task, bad config or other errors.
pub const INVALID: i32 = 1;
/// `taskbot run` finished with `success = false`.
pub const FAILED: i32 = 2;
