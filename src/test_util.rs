//! Test-only helpers for building store files and settings.

use std::collections::BTreeMap;

use crate::{
    config::CompactionSettings,
    store::{Clock, FileId, StaticStoreInfo, StoreFile, StoreFileMeta},
};

/// Memstore flush size used by unit tests, and so the default `min_compact_size`.
pub(crate) const FLUSH_SIZE: u64 = 128 * 1024 * 1024;

/// Description of a file to add to a [`FileSet`].
pub(crate) struct NewFile {
    sequence_id: u64,
    bytes: u64,
    reference: bool,
    modified: Option<u64>,
    min_timestamp: Option<u64>,
    major_output: bool,
    bulk: bool,
}

impl NewFile {
    pub(crate) fn modified_at(mut self, millis: u64) -> Self {
        self.modified = Some(millis);
        self
    }

    pub(crate) fn min_timestamp(mut self, millis: u64) -> Self {
        self.min_timestamp = Some(millis);
        self
    }

    pub(crate) fn major_output(mut self) -> Self {
        self.major_output = true;
        self
    }

    pub(crate) fn bulk(mut self) -> Self {
        self.bulk = true;
        self
    }
}

/// Regular file with sequence id `sequence_id`, modified at `1_000 + sequence_id`.
pub(crate) fn file(sequence_id: u64, bytes: u64) -> NewFile {
    NewFile {
        sequence_id,
        bytes,
        reference: false,
        modified: None,
        min_timestamp: None,
        major_output: false,
        bulk: false,
    }
}

/// Split reference file.
pub(crate) fn reference(sequence_id: u64, bytes: u64) -> NewFile {
    NewFile {
        reference: true,
        ..file(sequence_id, bytes)
    }
}

/// Files of one store, each with a fresh identity.
#[derive(Default)]
pub(crate) struct FileSet {
    files: Vec<StoreFileMeta>,
}

impl FileSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, file: NewFile) -> StoreFileMeta {
        let modified = file.modified.unwrap_or(1_000 + file.sequence_id);
        let id = FileId::new();
        let mut meta = StoreFileMeta::new(id, file.sequence_id, file.bytes, modified)
            .reference(file.reference)
            .major_compaction_output(file.major_output)
            .exclude_from_minor(file.bulk);
        if let Some(ts) = file.min_timestamp {
            meta = meta.min_timestamp(ts);
        }
        self.files.push(meta.clone());
        meta
    }

    /// Files in insertion order.
    pub(crate) fn files(&self) -> Vec<StoreFileMeta> {
        self.files.clone()
    }
}

/// Resolve settings from `pairs` for a store flushing [`FLUSH_SIZE`] bytes.
pub(crate) fn resolve_settings(pairs: &[(&str, &str)]) -> CompactionSettings {
    let source: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    CompactionSettings::resolve(&source, &StaticStoreInfo::new(FLUSH_SIZE, 16))
        .expect("test settings resolve")
}

/// Clock frozen at a fixed instant.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

pub(crate) fn sequence_ids<F: StoreFile>(files: &[F]) -> Vec<u64> {
    files.iter().map(StoreFile::sequence_id).collect()
}

/// Asserts `subset` is a run of adjacent files of `all` (sorted by sequence id).
pub(crate) fn assert_contiguous<F: StoreFile>(all: &[F], subset: &[F]) {
    if subset.is_empty() {
        return;
    }
    let mut sorted = sequence_ids(all);
    sorted.sort_unstable();
    let ids = sequence_ids(subset);
    let start = sorted
        .iter()
        .position(|seq| *seq == ids[0])
        .expect("subset starts inside the store");
    assert_eq!(
        &sorted[start..start + ids.len()],
        ids.as_slice(),
        "selection is not contiguous"
    );
}
