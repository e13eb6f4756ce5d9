//! Logging conventions for compaction selection.
//!
//! Selection decisions are narrated through `tracing`. Every event uses the
//! crate target and carries an `event` field so operators can filter on a
//! single decision point (for example `event = "large_files_skipped"`).
//!
//! ## Library Integration
//!
//! The crate never installs a global subscriber. Applications configure
//! `tracing_subscriber` (or any other subscriber) themselves, e.g. with
//! `RUST_LOG=lsm_compaction_policy=debug`.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: the stage emitting the event ("config", "selector", "ratio", ...)
//! - Use `%` for Display, `?` for Debug formatting
//! - File counts and byte totals only; never log whole file lists

/// Target for all compaction policy log events.
pub(crate) const POLICY_TARGET: &str = "lsm_compaction_policy";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "config",
///     event = "settings_resolved",
///     summary = %settings,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::POLICY_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::POLICY_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::POLICY_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
