//! Helpers over collections of store files shared by every selection stage.

use crc32fast::Hasher;

use crate::{
    error::StoreFileError,
    store::{FileId, StoreFile},
};

/// Sort files oldest first by sequence id.
///
/// The sort is stable so files sharing a sequence id keep their input order.
pub fn sort_by_sequence_id<F: StoreFile>(files: &mut [F]) {
    files.sort_by_key(StoreFile::sequence_id);
}

/// Position of the file with identity `id`, if present.
pub fn position_of<F: StoreFile>(files: &[F], id: FileId) -> Option<usize> {
    files.iter().position(|file| file.file_id() == id)
}

/// `true` if any of the files is a split reference.
pub fn has_references<F: StoreFile>(files: &[F]) -> bool {
    files.iter().any(StoreFile::is_reference)
}

/// Oldest modification time among `files`, `None` for an empty set.
pub fn lowest_modification_time<F: StoreFile>(files: &[F]) -> Option<u64> {
    files.iter().map(StoreFile::modification_time_millis).min()
}

/// Sum of the byte lengths of `files`.
pub fn total_bytes<F: StoreFile>(files: &[F]) -> Result<u64, StoreFileError> {
    files.iter().try_fold(0u64, |acc, file| {
        Ok(acc.saturating_add(file.byte_len()?))
    })
}

/// Seed derived from the identity and age of every file in the set.
///
/// The seed does not depend on the order of `files` and only uses data that
/// survives a process restart, so the same on-disk file set always yields the
/// same seed. Returns `None` for an empty set.
pub fn deterministic_seed<F: StoreFile>(files: &[F]) -> Option<u64> {
    if files.is_empty() {
        return None;
    }
    let mut keys: Vec<(FileId, u64, u64)> = files
        .iter()
        .map(|file| {
            (
                file.file_id(),
                file.sequence_id(),
                file.modification_time_millis(),
            )
        })
        .collect();
    keys.sort_unstable();

    let mut hasher = Hasher::new();
    for (id, sequence_id, modified) in keys {
        hasher.update(&id.to_bytes());
        hasher.update(&sequence_id.to_le_bytes());
        hasher.update(&modified.to_le_bytes());
    }
    Some(u64::from(hasher.finalize()))
}
