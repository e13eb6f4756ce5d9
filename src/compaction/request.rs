use crate::{
    compaction::selector::remove_excess_files, config::CompactionSettings,
    error::StoreFileError, file_set, store::StoreFile,
};

/// Whether a request merges a subset of files or rewrites the whole store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactionKind {
    /// Merge a contiguous subset without purging deletes.
    Minor,
    /// Merge every store file and reclaim deleted/expired data.
    Major,
}

/// Who asked for the compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactionOrigin {
    /// Explicitly requested by a user or operator.
    User,
    /// Scheduled by the store's maintenance loop.
    Background,
}

impl CompactionOrigin {
    fn from_user_flag(is_user: bool) -> Self {
        if is_user {
            Self::User
        } else {
            Self::Background
        }
    }
}

/// Inputs a strategy needs besides the candidates themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionParams {
    /// The pipeline decided to attempt a major compaction.
    pub trying_major: bool,
    /// The compaction was requested by a user.
    pub is_user: bool,
    /// The off-peak ratio may be used.
    pub may_use_off_peak: bool,
    /// The store is close to its blocking file count.
    pub may_be_stuck: bool,
    /// Number of files in the store before any filtering.
    pub store_file_count: usize,
}

/// Files chosen for the next compaction, oldest first.
///
/// An empty request means there is nothing to do now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactionRequest<F> {
    files: Vec<F>,
    kind: CompactionKind,
    origin: CompactionOrigin,
    off_peak: bool,
    all_files: bool,
}

impl<F> CompactionRequest<F> {
    /// A request selecting nothing.
    pub fn empty(origin: CompactionOrigin) -> Self {
        Self {
            files: Vec::new(),
            kind: CompactionKind::Minor,
            origin,
            off_peak: false,
            all_files: false,
        }
    }

    /// Finish a strategy's selection into a request.
    ///
    /// Trims the selection to `max_files_to_compact` unless this is a
    /// user-requested major compaction, then classifies it. The request is
    /// major only when a major compaction was attempted and every store file
    /// made it into the selection; off-peak applies only to non-empty
    /// requests that leave some store file out.
    pub fn from_selection(
        settings: &CompactionSettings,
        mut files: Vec<F>,
        params: SelectionParams,
    ) -> Self {
        remove_excess_files(
            &mut files,
            settings.max_files_to_compact(),
            params.is_user,
            params.trying_major,
        );
        let all_files = !files.is_empty() && files.len() == params.store_file_count;
        let kind = if params.trying_major && all_files {
            CompactionKind::Major
        } else {
            CompactionKind::Minor
        };
        let off_peak = !files.is_empty() && !all_files && params.may_use_off_peak;
        Self {
            files,
            kind,
            origin: CompactionOrigin::from_user_flag(params.is_user),
            off_peak,
            all_files,
        }
    }

    /// Selected files, oldest first.
    pub fn files(&self) -> &[F] {
        &self.files
    }

    /// Consume the request and return the selected files.
    pub fn into_files(self) -> Vec<F> {
        self.files
    }

    /// Number of selected files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Minor or major.
    pub fn kind(&self) -> CompactionKind {
        self.kind
    }

    /// Shorthand for `kind() == CompactionKind::Major`.
    pub fn is_major(&self) -> bool {
        self.kind == CompactionKind::Major
    }

    /// User or background.
    pub fn origin(&self) -> CompactionOrigin {
        self.origin
    }

    /// `true` if the off-peak ratio applies to this request.
    pub fn is_off_peak(&self) -> bool {
        self.off_peak
    }

    /// `true` if every store file is part of the request.
    pub fn is_all_files(&self) -> bool {
        self.all_files
    }
}

impl<F: StoreFile> CompactionRequest<F> {
    /// Total bytes of the selected files.
    pub fn total_bytes(&self) -> Result<u64, StoreFileError> {
        file_set::total_bytes(&self.files)
    }
}
