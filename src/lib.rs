#![deny(missing_docs)]
//! Compaction selection for log-structured-merge stores.
//!
//! A store keeps its data in immutable, sequence-ordered files. This crate
//! decides which of those files should be merged next, whether the merge
//! should be upgraded to a major compaction, and when the next periodic major
//! compaction is due. It performs no I/O of its own: the owning store hands in
//! read-only [`StoreFile`] handles and [`StoreConfigInfo`] facts, and executes
//! the returned [`CompactionRequest`] however it sees fit.
//!
//! ```
//! use std::{collections::HashMap, sync::Arc};
//!
//! use lsm_compaction_policy::{
//!     CompactionSelector, CompactionSettings, FileId, StaticStoreInfo, StoreFileMeta,
//! };
//!
//! let store = Arc::new(StaticStoreInfo::new(128 * 1024 * 1024, 16));
//! let config: HashMap<String, String> = HashMap::new();
//! let settings = Arc::new(CompactionSettings::resolve(&config, store.as_ref()).unwrap());
//! let selector = CompactionSelector::new(settings, store);
//!
//! let files: Vec<StoreFileMeta> = (1..=4)
//!     .map(|seq| StoreFileMeta::new(FileId::new(), seq, 1024 * 1024, 1_000 + seq))
//!     .collect();
//! let request = selector
//!     .select_compaction(&files, &[], false, false, false)
//!     .unwrap();
//! assert_eq!(request.len(), 4);
//! ```

/// Compaction selection pipeline and strategies.
pub mod compaction;
/// Compaction tunables and their resolution.
pub mod config;
/// Error types.
pub mod error;
/// Helpers over collections of store files.
pub mod file_set;
/// Read-only views of the owning store.
pub mod store;

mod observability;

#[cfg(test)]
mod test_util;

pub use crate::{
    compaction::{
        BuiltinStrategy, CompactionKind, CompactionOrigin, CompactionRequest, CompactionSelector,
        SelectionContext, SelectionParams, SelectionStrategy, StrategyKind,
    },
    config::{CompactionSettings, ConfigSource},
    error::{ConfigError, SelectionError, StoreFileError},
    store::{
        Clock, FileId, StaticStoreInfo, StoreConfigInfo, StoreFile, StoreFileMeta, SystemClock,
    },
};
