//! Error types surfaced by configuration resolution and compaction selection.

use thiserror::Error;

use crate::store::FileId;

/// Failure to coerce a configured tunable into its typed value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The raw value could not be parsed as the type the key expects.
    #[error("invalid value `{value}` for `{key}`: expected {expected}")]
    InvalidValue {
        /// Configuration key holding the value.
        key: String,
        /// Raw value as found in the configuration source.
        value: String,
        /// Human readable description of the expected type.
        expected: &'static str,
    },
    /// The strategy name does not match any builtin selection strategy.
    #[error("unknown compaction strategy `{value}` for `{key}`")]
    UnknownStrategy {
        /// Configuration key holding the strategy name.
        key: String,
        /// Unrecognised strategy name.
        value: String,
    },
}

/// Failure reported by a caller-supplied store file handle.
#[derive(Debug, Error)]
pub enum StoreFileError {
    /// Reading the length or reader metadata of the file failed.
    #[error("failed to read metadata of store file {file}: {source}")]
    Metadata {
        /// File whose metadata could not be read.
        file: FileId,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file has no open reader (for example it was closed concurrently).
    #[error("store file {file} has no open reader")]
    ReaderClosed {
        /// File without a reader.
        file: FileId,
    },
}

/// Failure of a single selection attempt.
///
/// A failed attempt never yields a partial request; callers log the error and
/// retry on the next scheduling tick.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The newest file already being compacted is not part of the candidate set.
    #[error("compacting file {file} is not among the store's candidate files")]
    CompactingFileMissing {
        /// Newest file of the compacting set.
        file: FileId,
    },
    /// A store file could not report its metadata.
    #[error(transparent)]
    StoreFile(#[from] StoreFileError),
}
