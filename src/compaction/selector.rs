//! Shared selection pipeline applied before any strategy runs.
//!
//! Candidates are always handled in sequence-id order. Every stage only ever
//! removes a prefix or a suffix of that order, so whatever survives is a
//! contiguous run.

use std::{sync::Arc, time::Duration};

use crate::{
    compaction::{
        request::{CompactionRequest, SelectionParams},
        strategy::{BuiltinStrategy, SelectionContext, SelectionStrategy},
    },
    config::CompactionSettings,
    error::{SelectionError, StoreFileError},
    file_set::{has_references, position_of, sort_by_sequence_id},
    observability::{log_debug, log_warn},
    store::{Clock, StoreConfigInfo, StoreFile, SystemClock},
};

/// Decides what a store should compact next and when.
///
/// The selector holds no per-call state. Concurrent calls for different
/// stores need no coordination; calls for one store must be serialized by
/// the caller against changes to that store's file set.
pub struct CompactionSelector<P = BuiltinStrategy> {
    settings: Arc<CompactionSettings>,
    store: Arc<dyn StoreConfigInfo>,
    clock: Arc<dyn Clock>,
    strategy: P,
}

impl CompactionSelector<BuiltinStrategy> {
    /// Selector using the builtin strategy named by the settings.
    pub fn new(settings: Arc<CompactionSettings>, store: Arc<dyn StoreConfigInfo>) -> Self {
        let strategy = settings.window_strategy().build();
        Self::with_strategy(settings, store, strategy)
    }
}

impl<P: SelectionStrategy> CompactionSelector<P> {
    /// Selector using a caller-provided strategy.
    pub fn with_strategy(
        settings: Arc<CompactionSettings>,
        store: Arc<dyn StoreConfigInfo>,
        strategy: P,
    ) -> Self {
        Self {
            settings,
            store,
            clock: Arc::new(SystemClock),
            strategy,
        }
    }

    /// Replace the wall clock used for age computations.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Settings snapshot this selector was built with.
    pub fn settings(&self) -> &CompactionSettings {
        &self.settings
    }

    /// Strategy making the final choice.
    pub fn strategy(&self) -> &P {
        &self.strategy
    }

    fn context(&self) -> SelectionContext<'_> {
        SelectionContext::new(&self.settings, self.store.as_ref(), self.clock.now_millis())
    }

    /// Select the files to compact next.
    ///
    /// `candidates` is the store's whole file set in any order; `compacting`
    /// lists the files already scheduled for another compaction, oldest first.
    /// Returns an empty request when there is nothing worth doing.
    pub fn select_compaction<F>(
        &self,
        candidates: &[F],
        compacting: &[F],
        is_user: bool,
        may_use_off_peak: bool,
        force_major: bool,
    ) -> Result<CompactionRequest<F>, SelectionError>
    where
        F: StoreFile + Clone,
    {
        let settings = self.settings.as_ref();
        let mut selection = candidates.to_vec();
        sort_by_sequence_id(&mut selection);
        let store_file_count = selection.len();

        // Stuck and not compacting enough (estimate). Count one future file
        // for the compaction already in flight.
        let future_files: i128 = if compacting.is_empty() { 0 } else { 1 };
        let blocking = self.store.blocking_file_count();
        let may_be_stuck = store_file_count as i128 - compacting.len() as i128 + future_files
            >= i128::from(blocking);

        let mut selection = eligible_files(selection, compacting)?;
        log_debug!(
            component = "selector",
            event = "selection_started",
            store_files = store_file_count,
            compacting = compacting.len(),
            eligible = selection.len(),
            blocking = blocking,
            may_be_stuck = may_be_stuck,
        );

        if !force_major {
            selection = skip_large_files(selection, settings.max_compact_size())?;
        }

        let ctx = self.context();
        // A user-forced major compaction always goes ahead. Otherwise a
        // requested or due major compaction needs the candidate count to stay
        // below the file limit. References must always be compacted away.
        let below_limit = selection.len() < settings.max_files_to_compact();
        let trying_major = (force_major && is_user)
            || (below_limit
                && (force_major
                    || self
                        .strategy
                        .should_perform_major_compaction(&ctx, &selection)?))
            || has_references(&selection);
        if trying_major {
            log_debug!(
                component = "selector",
                event = "trying_major",
                force_major = force_major,
                is_user = is_user,
                candidates = selection.len(),
            );
        }

        let params = SelectionParams {
            trying_major,
            is_user,
            may_use_off_peak,
            may_be_stuck,
            store_file_count,
        };
        let request = self.strategy.build_request(&ctx, selection, params)?;
        log_debug!(
            component = "selector",
            event = "selection_finished",
            selected = request.len(),
            major = request.is_major(),
            off_peak = request.is_off_peak(),
        );
        Ok(request)
    }

    /// Candidates sorted oldest first with everything up to the newest
    /// compacting file removed, before any size or policy filtering.
    pub fn pre_select_compaction<F>(
        &self,
        candidates: &[F],
        compacting: &[F],
    ) -> Result<Vec<F>, SelectionError>
    where
        F: StoreFile + Clone,
    {
        let mut selection = candidates.to_vec();
        sort_by_sequence_id(&mut selection);
        eligible_files(selection, compacting)
    }

    /// Cheap admission check: enough files outside running compactions.
    pub fn needs_compaction<F: StoreFile>(&self, store_files: &[F], compacting: &[F]) -> bool {
        let available = store_files.len() as i128 - compacting.len() as i128;
        available >= self.settings.min_files_to_compact() as i128
    }

    /// `true` if a compaction of `total_bytes` counts as large.
    pub fn throttle_compaction(&self, total_bytes: u64) -> bool {
        total_bytes > self.settings.throttle_point()
    }

    /// `true` if `files` are due for a major compaction under this selector's strategy.
    pub fn should_perform_major_compaction<F: StoreFile>(
        &self,
        files: &[F],
    ) -> Result<bool, SelectionError> {
        self.strategy
            .should_perform_major_compaction(&self.context(), files)
    }

    /// Time until the next major compaction of `files` is due.
    pub fn next_major_compact_time<F: StoreFile>(&self, files: &[F]) -> Duration {
        self.context().next_major_compact_time(files)
    }
}

/// Drop every candidate at or before the newest compacting file.
///
/// Keeps new selections from overlapping running compactions and keeps the
/// compacted ranges contiguous. `candidates` must be sorted oldest first.
pub fn eligible_files<F: StoreFile>(
    mut candidates: Vec<F>,
    compacting: &[F],
) -> Result<Vec<F>, SelectionError> {
    let Some(newest) = compacting.iter().max_by_key(|file| file.sequence_id()) else {
        return Ok(candidates);
    };
    let Some(idx) = position_of(&candidates, newest.file_id()) else {
        log_warn!(
            component = "selector",
            event = "compacting_file_missing",
            file = %newest.file_id(),
            candidates = candidates.len(),
        );
        return Err(SelectionError::CompactingFileMissing {
            file: newest.file_id(),
        });
    };
    candidates.drain(..=idx);
    Ok(candidates)
}

/// Drop the leading files larger than `max_compact_size`.
///
/// Stops at the first file that is a reference or within bounds; files past
/// that point stay even when oversized.
pub fn skip_large_files<F: StoreFile>(
    mut candidates: Vec<F>,
    max_compact_size: u64,
) -> Result<Vec<F>, StoreFileError> {
    let mut pos = 0;
    while pos < candidates.len() {
        let file = &candidates[pos];
        if file.is_reference() || file.byte_len()? <= max_compact_size {
            break;
        }
        pos += 1;
    }
    if pos > 0 {
        log_debug!(
            component = "selector",
            event = "large_files_skipped",
            skipped = pos,
            max_compact_size = max_compact_size,
        );
        candidates.drain(..pos);
    }
    Ok(candidates)
}

/// Drop files excluded from minor compactions.
///
/// Everything up to and including the newest excluded file goes, so the
/// remaining candidates stay contiguous.
pub fn filter_bulk<F: StoreFile>(mut candidates: Vec<F>) -> Vec<F> {
    let Some(last) = candidates
        .iter()
        .rposition(StoreFile::exclude_from_minor_compaction)
    else {
        return candidates;
    };
    log_debug!(
        component = "selector",
        event = "bulk_files_excluded",
        excluded = last + 1,
    );
    candidates.drain(..=last);
    candidates
}

/// Keep at most `max_files` of the oldest candidates.
///
/// User-requested major compactions are exempt and keep every file.
pub fn remove_excess_files<F>(
    candidates: &mut Vec<F>,
    max_files: usize,
    is_user: bool,
    is_major: bool,
) {
    let excess = candidates.len().saturating_sub(max_files);
    if excess == 0 {
        return;
    }
    if is_major && is_user {
        log_debug!(
            component = "selector",
            event = "user_major_exceeds_max_files",
            files = candidates.len(),
            max_files = max_files,
        );
    } else {
        log_debug!(
            component = "selector",
            event = "excess_files_excluded",
            excluded = excess,
            max_files = max_files,
        );
        candidates.truncate(max_files);
    }
}

/// Clear the selection when it holds fewer than `min_files` files.
pub fn check_min_files_criteria<F>(mut candidates: Vec<F>, min_files: usize) -> Vec<F> {
    if candidates.len() < min_files {
        log_debug!(
            component = "selector",
            event = "not_enough_files",
            ready = candidates.len(),
            min_files = min_files,
        );
        candidates.clear();
    }
    candidates
}
