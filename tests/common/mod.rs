//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use lsm_compaction_policy::{
    Clock, CompactionSelector, CompactionSettings, FileId, StaticStoreInfo, StoreFile,
    StoreFileMeta,
};
use tracing_subscriber::EnvFilter;

pub const MB: u64 = 1024 * 1024;
pub const FLUSH_SIZE: u64 = 128 * MB;

/// Route selector narration to the test output when `RUST_LOG` asks for it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Clock frozen at a fixed instant, early enough that nothing is due for a
/// periodic major compaction.
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

pub fn selector(pairs: &[(&str, &str)], blocking_file_count: u64) -> CompactionSelector {
    init_tracing();
    let store = Arc::new(StaticStoreInfo::new(FLUSH_SIZE, blocking_file_count));
    let settings = CompactionSettings::resolve(&config(pairs), store.as_ref())
        .expect("settings should resolve");
    CompactionSelector::new(Arc::new(settings), store).with_clock(Arc::new(FixedClock(2_000)))
}

/// Files with sequence ids `1..=sizes.len()`, oldest first.
pub fn files(sizes: &[u64]) -> Vec<StoreFileMeta> {
    (1..)
        .zip(sizes)
        .map(|(seq, bytes)| StoreFileMeta::new(FileId::new(), seq, *bytes, 1_000 + seq))
        .collect()
}

pub fn sequence_ids<F: StoreFile>(files: &[F]) -> Vec<u64> {
    files.iter().map(StoreFile::sequence_id).collect()
}

/// `true` when `ids` are consecutive sequence ids.
pub fn is_run(ids: &[u64]) -> bool {
    ids.windows(2).all(|pair| pair[1] == pair[0] + 1)
}
