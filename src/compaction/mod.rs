//! Compaction selection.
//!
//! [`CompactionSelector`] runs the shared pipeline (sort, eligibility, large
//! file skipping, major compaction upgrade) and hands the surviving candidates
//! to a [`SelectionStrategy`] which picks the final contiguous run of files.

/// Window search picking the best admissible run of files.
mod exploring;
/// Ratio-based selection and the age-based major compaction predicate.
mod ratio;
/// Selection parameters and the resulting compaction request.
mod request;
/// Jittered scheduling of periodic major compactions.
mod schedule;
/// Shared selection pipeline and its individual stages.
mod selector;
/// Strategy trait and the builtin strategies selectable via configuration.
mod strategy;

pub use exploring::ExploringStrategy;
pub use ratio::{major_compaction_due, RatioStrategy};
pub use request::{CompactionKind, CompactionOrigin, CompactionRequest, SelectionParams};
pub use schedule::next_major_compact_time;
pub use selector::{
    check_min_files_criteria, eligible_files, filter_bulk, remove_excess_files, skip_large_files,
    CompactionSelector,
};
pub use strategy::{BuiltinStrategy, SelectionContext, SelectionStrategy, StrategyKind};
