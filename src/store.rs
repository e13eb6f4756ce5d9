//! Read-only views of the owning store consumed by the selector.
//!
//! The selector never opens, mutates or deletes files. Everything it needs
//! about a store is expressed through the traits in this module so the owning
//! store can hand in whichever handles it already keeps.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ulid::Ulid;

use crate::error::StoreFileError;

/// Identity of a store file. Two handles describe the same file iff their ids match.
pub type FileId = Ulid;

/// Immutable handle to one sorted on-disk segment of a store.
pub trait StoreFile {
    /// Identity of the file. Used to locate compacting files among candidates.
    fn file_id(&self) -> FileId;

    /// Sequence id defining the total order of files within the store.
    fn sequence_id(&self) -> u64;

    /// Length of the file in bytes.
    fn byte_len(&self) -> Result<u64, StoreFileError>;

    /// `true` when the file is a reference produced by a region split.
    fn is_reference(&self) -> bool;

    /// Last modification (flush) time in milliseconds since the Unix epoch.
    fn modification_time_millis(&self) -> u64;

    /// Smallest cell timestamp recorded in the file, when known.
    fn min_timestamp_millis(&self) -> Option<u64> {
        None
    }

    /// `true` when the file was itself written by a major compaction.
    fn is_major_compaction_output(&self) -> bool {
        false
    }

    /// `true` for files (typically bulk loaded) that minor compactions must skip.
    fn exclude_from_minor_compaction(&self) -> bool {
        false
    }
}

macro_rules! forward_store_file {
    ($($ptr:ty),+ $(,)?) => {$(
        impl<T: StoreFile + ?Sized> StoreFile for $ptr {
            fn file_id(&self) -> FileId {
                (**self).file_id()
            }

            fn sequence_id(&self) -> u64 {
                (**self).sequence_id()
            }

            fn byte_len(&self) -> Result<u64, StoreFileError> {
                (**self).byte_len()
            }

            fn is_reference(&self) -> bool {
                (**self).is_reference()
            }

            fn modification_time_millis(&self) -> u64 {
                (**self).modification_time_millis()
            }

            fn min_timestamp_millis(&self) -> Option<u64> {
                (**self).min_timestamp_millis()
            }

            fn is_major_compaction_output(&self) -> bool {
                (**self).is_major_compaction_output()
            }

            fn exclude_from_minor_compaction(&self) -> bool {
                (**self).exclude_from_minor_compaction()
            }
        }
    )+};
}

forward_store_file!(&T, Box<T>, Arc<T>);

/// Plain metadata snapshot of a store file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreFileMeta {
    file_id: FileId,
    sequence_id: u64,
    bytes: u64,
    reference: bool,
    modification_time_millis: u64,
    min_timestamp_millis: Option<u64>,
    major_compaction_output: bool,
    exclude_from_minor: bool,
}

impl StoreFileMeta {
    /// Describe a regular (non-reference) file.
    pub fn new(
        file_id: FileId,
        sequence_id: u64,
        bytes: u64,
        modification_time_millis: u64,
    ) -> Self {
        Self {
            file_id,
            sequence_id,
            bytes,
            reference: false,
            modification_time_millis,
            min_timestamp_millis: None,
            major_compaction_output: false,
            exclude_from_minor: false,
        }
    }

    /// Mark the file as a split reference.
    #[must_use]
    pub fn reference(mut self, reference: bool) -> Self {
        self.reference = reference;
        self
    }

    /// Record the smallest cell timestamp held by the file.
    #[must_use]
    pub fn min_timestamp(mut self, millis: u64) -> Self {
        self.min_timestamp_millis = Some(millis);
        self
    }

    /// Mark the file as the output of a major compaction.
    #[must_use]
    pub fn major_compaction_output(mut self, major: bool) -> Self {
        self.major_compaction_output = major;
        self
    }

    /// Exclude the file from minor compactions.
    #[must_use]
    pub fn exclude_from_minor(mut self, exclude: bool) -> Self {
        self.exclude_from_minor = exclude;
        self
    }
}

impl StoreFile for StoreFileMeta {
    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    fn byte_len(&self) -> Result<u64, StoreFileError> {
        Ok(self.bytes)
    }

    fn is_reference(&self) -> bool {
        self.reference
    }

    fn modification_time_millis(&self) -> u64 {
        self.modification_time_millis
    }

    fn min_timestamp_millis(&self) -> Option<u64> {
        self.min_timestamp_millis
    }

    fn is_major_compaction_output(&self) -> bool {
        self.major_compaction_output
    }

    fn exclude_from_minor_compaction(&self) -> bool {
        self.exclude_from_minor
    }
}

/// Scalar facts about the owning store.
pub trait StoreConfigInfo: Send + Sync {
    /// Configured memstore flush size in bytes.
    fn memstore_flush_size(&self) -> u64;

    /// File count at which writes to the store stall.
    fn blocking_file_count(&self) -> u64;

    /// Time-to-live of cells in the store; `None` keeps data forever.
    fn store_file_ttl(&self) -> Option<Duration> {
        None
    }

    /// Fraction of the store's blocks that are local to this server, in `[0, 1]`.
    fn block_locality_index(&self) -> f64 {
        1.0
    }
}

/// Fixed [`StoreConfigInfo`] values.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticStoreInfo {
    /// Memstore flush size in bytes.
    pub memstore_flush_size: u64,
    /// File count at which writes stall.
    pub blocking_file_count: u64,
    /// Cell time-to-live, `None` for no expiry.
    pub ttl: Option<Duration>,
    /// Block locality index in `[0, 1]`.
    pub block_locality: f64,
}

impl StaticStoreInfo {
    /// Build store facts with no TTL and full locality.
    pub fn new(memstore_flush_size: u64, blocking_file_count: u64) -> Self {
        Self {
            memstore_flush_size,
            blocking_file_count,
            ttl: None,
            block_locality: 1.0,
        }
    }
}

impl StoreConfigInfo for StaticStoreInfo {
    fn memstore_flush_size(&self) -> u64 {
        self.memstore_flush_size
    }

    fn blocking_file_count(&self) -> u64 {
        self.blocking_file_count
    }

    fn store_file_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn block_locality_index(&self) -> f64 {
        self.block_locality
    }
}

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}
