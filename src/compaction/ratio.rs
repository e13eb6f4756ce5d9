//! Ratio-based selection and the age-based major compaction predicate.

use std::time::Duration;

use crate::{
    compaction::{
        request::{CompactionRequest, SelectionParams},
        selector::{check_min_files_criteria, filter_bulk},
        strategy::{SelectionContext, SelectionStrategy},
    },
    config::CompactionSettings,
    error::{SelectionError, StoreFileError},
    file_set::lowest_modification_time,
    observability::log_debug,
    store::StoreFile,
};

/// Skips old files that dwarf the files written after them.
///
/// Starting from the oldest candidate, a file is skipped while it is larger
/// than both `min_compact_size` and `ratio` times the combined size of the
/// next `max_files_to_compact - 1` files. Whatever remains (bounded by the
/// file limit when the request is finished) is compacted.
#[derive(Clone, Copy, Debug, Default)]
pub struct RatioStrategy;

impl RatioStrategy {
    /// Create the strategy.
    pub fn new() -> Self {
        Self
    }

    /// Apply the ratio test to `candidates` (sorted oldest first).
    ///
    /// When fewer than `min_files_to_compact` files survive and the store may
    /// be stuck, the newest `min_files_to_compact` files are taken instead.
    /// The fallback keys on "too few survivors" rather than "every file
    /// skipped": the skip loop always stops with at least that many files
    /// left, so an all-skipped condition would never fire.
    pub fn apply_compaction_policy<F: StoreFile>(
        &self,
        settings: &CompactionSettings,
        mut candidates: Vec<F>,
        may_use_off_peak: bool,
        may_be_stuck: bool,
    ) -> Result<Vec<F>, StoreFileError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let ratio = if may_use_off_peak {
            settings.off_peak_compaction_ratio()
        } else {
            settings.compaction_ratio()
        };
        let min_files = settings.min_files_to_compact();
        let max_files = settings.max_files_to_compact();
        let count = candidates.len();

        let sizes = candidates
            .iter()
            .map(StoreFile::byte_len)
            .collect::<Result<Vec<_>, _>>()?;
        let mut prefix = vec![0u64; count + 1];
        for (i, size) in sizes.iter().enumerate() {
            prefix[i + 1] = prefix[i].saturating_add(*size);
        }
        // Combined size of the `max_files - 1` files starting at `i`.
        let following = |i: usize| -> u64 {
            let end = i.saturating_add(max_files).saturating_sub(1).min(count);
            if end > i {
                prefix[end] - prefix[i]
            } else {
                0
            }
        };

        let mut start = 0;
        while start < count
            && count - start >= min_files
            && sizes[start]
                > settings
                    .min_compact_size()
                    .max((following(start + 1) as f64 * ratio) as u64)
        {
            start += 1;
        }

        if count - start < min_files && may_be_stuck && count >= min_files {
            // Too few files passed the ratio test. Compact the newest files we can.
            start = count - min_files;
            log_debug!(
                component = "ratio",
                event = "stuck_fallback",
                selected = min_files,
                candidates = count,
            );
        } else {
            log_debug!(
                component = "ratio",
                event = "files_selected",
                selected = count - start,
                candidates = count,
                ratio = ratio,
            );
        }
        candidates.drain(..start);
        Ok(candidates)
    }
}

impl SelectionStrategy for RatioStrategy {
    fn build_request<F>(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: Vec<F>,
        params: SelectionParams,
    ) -> Result<CompactionRequest<F>, SelectionError>
    where
        F: StoreFile + Clone,
    {
        let settings = ctx.settings();
        let mut selection = candidates;
        if !params.trying_major {
            selection = filter_bulk(selection);
            selection = self.apply_compaction_policy(
                settings,
                selection,
                params.may_use_off_peak,
                params.may_be_stuck,
            )?;
            selection = check_min_files_criteria(selection, settings.min_files_to_compact());
        }
        Ok(CompactionRequest::from_selection(settings, selection, params))
    }

    fn should_perform_major_compaction<F>(
        &self,
        ctx: &SelectionContext<'_>,
        files: &[F],
    ) -> Result<bool, SelectionError>
    where
        F: StoreFile,
    {
        Ok(major_compaction_due(ctx, files))
    }
}

/// `true` when the oldest of `files` has outlived the next major compaction time.
///
/// A lone file that is already a major compaction output is only rewritten
/// when the store's block locality fell below the configured minimum, or
/// when its data has outlived the store's TTL.
pub fn major_compaction_due<F: StoreFile>(ctx: &SelectionContext<'_>, files: &[F]) -> bool {
    let Some(lowest) = lowest_modification_time(files) else {
        return false;
    };
    let next = ctx.next_major_compact_time(files);
    if next.is_zero() {
        return false;
    }
    let now = ctx.now_millis();
    let next_ms = u64::try_from(next.as_millis()).unwrap_or(u64::MAX);
    if lowest == 0 || lowest >= now.saturating_sub(next_ms) {
        return false;
    }

    let [file] = files else {
        log_debug!(
            component = "ratio",
            event = "major_compaction_due",
            files = files.len(),
            oldest_modified_ms = lowest,
        );
        return true;
    };

    let ttl = ctx.store().store_file_ttl();
    let oldest = file
        .min_timestamp_millis()
        .map(|ts| Duration::from_millis(now.saturating_sub(ts)));
    let within_ttl = match (ttl, oldest) {
        (Some(ttl), Some(oldest)) => oldest < ttl,
        _ => true,
    };
    if file.is_major_compaction_output() && within_ttl {
        let locality = ctx.store().block_locality_index();
        let min_locality = ctx.settings().min_locality_to_force_compact();
        if locality < min_locality {
            log_debug!(
                component = "ratio",
                event = "major_compaction_for_locality",
                locality = locality,
                min_locality = min_locality,
            );
            return true;
        }
        log_debug!(
            component = "ratio",
            event = "major_compaction_skipped",
            reason = "single_major_file",
            locality = locality,
        );
        return false;
    }
    match (ttl, oldest) {
        (Some(ttl), Some(oldest)) if oldest > ttl => {
            log_debug!(
                component = "ratio",
                event = "major_compaction_for_ttl",
                oldest_ms = oldest.as_millis() as u64,
                ttl_ms = ttl.as_millis() as u64,
            );
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::{MAJOR_JITTER_KEY, MAJOR_PERIOD_KEY, MAX_FILES_KEY, MIN_LOCALITY_KEY},
        store::StaticStoreInfo,
        test_util::{file, resolve_settings, sequence_ids, FileSet},
    };

    const MB: u64 = 1024 * 1024;

    fn params(may_be_stuck: bool, store_file_count: usize) -> SelectionParams {
        SelectionParams {
            trying_major: false,
            is_user: false,
            may_use_off_peak: false,
            may_be_stuck,
            store_file_count,
        }
    }

    #[test]
    fn skips_old_files_that_dwarf_newer_ones() {
        // min size well below the file sizes so the ratio test applies.
        let settings = resolve_settings(&[(crate::config::MIN_SIZE_KEY, "1")]);
        let store = StaticStoreInfo::new(MB, 100);
        let ctx = SelectionContext::new(&settings, &store, 0);
        let mut set = FileSet::new();
        set.push(file(1, 400 * MB));
        set.push(file(2, 50 * MB));
        set.push(file(3, 20 * MB));
        set.push(file(4, 20 * MB));
        set.push(file(5, 20 * MB));
        let files = set.files();

        let request = RatioStrategy::new()
            .build_request(&ctx, files, params(false, 5))
            .expect("request");
        assert_eq!(sequence_ids(request.files()), vec![2, 3, 4, 5]);
        assert!(!request.is_major());
    }

    #[test]
    fn off_peak_ratio_is_more_permissive() {
        let settings = resolve_settings(&[(crate::config::MIN_SIZE_KEY, "1")]);
        let mut set = FileSet::new();
        set.push(file(1, 300 * MB));
        set.push(file(2, 100 * MB));
        set.push(file(3, 100 * MB));
        let files = set.files();
        let strategy = RatioStrategy::new();

        let peak = strategy
            .apply_compaction_policy(&settings, files.clone(), false, false)
            .expect("peak");
        assert_eq!(sequence_ids(&peak), vec![2, 3]);
        let off_peak = strategy
            .apply_compaction_policy(&settings, files, true, false)
            .expect("off-peak");
        assert_eq!(sequence_ids(&off_peak), vec![1, 2, 3]);
    }

    #[test]
    fn stuck_store_compacts_newest_files() {
        let settings = resolve_settings(&[(crate::config::MIN_SIZE_KEY, "1")]);
        let mut set = FileSet::new();
        set.push(file(1, 800 * MB));
        set.push(file(2, 200 * MB));
        set.push(file(3, 50 * MB));
        set.push(file(4, 10 * MB));
        let files = set.files();
        let strategy = RatioStrategy::new();

        let relaxed = strategy
            .apply_compaction_policy(&settings, files.clone(), false, false)
            .expect("relaxed");
        assert_eq!(sequence_ids(&relaxed), vec![3, 4]);
        let stuck = strategy
            .apply_compaction_policy(&settings, files, false, true)
            .expect("stuck");
        assert_eq!(sequence_ids(&stuck), vec![2, 3, 4]);
    }

    #[test]
    fn degenerate_limits_do_not_panic() {
        let settings = resolve_settings(&[(MAX_FILES_KEY, "0")]);
        settings.set_min_files_to_compact(0);
        let mut set = FileSet::new();
        set.push(file(1, 10));
        set.push(file(2, 10));
        let kept = RatioStrategy::new()
            .apply_compaction_policy(&settings, set.files(), false, true)
            .expect("apply");
        assert!(kept.len() <= 2);
    }

    fn aged_ctx_settings() -> crate::config::CompactionSettings {
        resolve_settings(&[(MAJOR_PERIOD_KEY, "1000"), (MAJOR_JITTER_KEY, "0")])
    }

    #[test]
    fn old_files_are_due_for_major_compaction() {
        let settings = aged_ctx_settings();
        let store = StaticStoreInfo::new(MB, 100);
        let mut set = FileSet::new();
        set.push(file(1, 10).modified_at(100));
        set.push(file(2, 10).modified_at(5_000));
        let files = set.files();

        let ctx = SelectionContext::new(&settings, &store, 10_000);
        assert!(major_compaction_due(&ctx, &files));
        let ctx = SelectionContext::new(&settings, &store, 1_050);
        assert!(!major_compaction_due(&ctx, &files));
        assert!(!major_compaction_due::<crate::StoreFileMeta>(&ctx, &[]));
    }

    #[test]
    fn single_major_output_is_recompacted_only_for_locality_or_ttl() {
        let settings = resolve_settings(&[
            (MAJOR_PERIOD_KEY, "1000"),
            (MAJOR_JITTER_KEY, "0"),
            (MIN_LOCALITY_KEY, "0.7"),
        ]);
        let mut set = FileSet::new();
        let single = vec![set.push(
            file(1, 10)
                .modified_at(100)
                .min_timestamp(100)
                .major_output(),
        )];

        let local = StaticStoreInfo::new(MB, 100);
        let ctx = SelectionContext::new(&settings, &local, 10_000);
        assert!(!major_compaction_due(&ctx, &single));

        let mut remote = StaticStoreInfo::new(MB, 100);
        remote.block_locality = 0.2;
        let ctx = SelectionContext::new(&settings, &remote, 10_000);
        assert!(major_compaction_due(&ctx, &single));

        let mut expiring = StaticStoreInfo::new(MB, 100);
        expiring.ttl = Some(Duration::from_millis(5_000));
        let ctx = SelectionContext::new(&settings, &expiring, 10_000);
        assert!(major_compaction_due(&ctx, &single));

        let mut set = FileSet::new();
        let minor_output = vec![set.push(file(1, 10).modified_at(100).min_timestamp(100))];
        let ctx = SelectionContext::new(&settings, &local, 10_000);
        assert!(!major_compaction_due(&ctx, &minor_output));
        let ctx = SelectionContext::new(&settings, &expiring, 10_000);
        assert!(major_compaction_due(&ctx, &minor_output));
    }
}
