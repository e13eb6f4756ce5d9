use crate::{
    compaction::{
        ratio::major_compaction_due,
        request::{CompactionRequest, SelectionParams},
        selector::{check_min_files_criteria, filter_bulk},
        strategy::{SelectionContext, SelectionStrategy},
    },
    config::CompactionSettings,
    error::{SelectionError, StoreFileError},
    observability::log_debug,
    store::StoreFile,
};

/// Required improvement in files-per-byte before a stuck store switches windows.
const STUCK_QUALITY_THRESHOLD: f64 = 1.05;

/// Examines every admissible contiguous window of candidates and keeps the one
/// compacting the most files, preferring the smaller window on ties.
///
/// A window is admissible when it holds between `min_files_to_compact` and
/// `max_files_to_compact` files, does not exceed `max_compact_size`, and each
/// of its files is within `ratio` of the rest of the window (windows below
/// `min_compact_size` skip the ratio test).
#[derive(Clone, Copy, Debug, Default)]
pub struct ExploringStrategy;

#[derive(Clone, Copy)]
struct Window {
    start: usize,
    end: usize,
    // Wide enough that no window total saturates.
    bytes: u128,
}

impl Window {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

impl ExploringStrategy {
    /// Create the strategy.
    pub fn new() -> Self {
        Self
    }

    /// Keep the best admissible window of `candidates` (sorted oldest first).
    ///
    /// Returns no files when no window qualifies, unless the store may be
    /// stuck, in which case the smallest window of acceptable length is used.
    pub fn apply_compaction_policy<F: StoreFile>(
        &self,
        settings: &CompactionSettings,
        mut candidates: Vec<F>,
        may_use_off_peak: bool,
        may_be_stuck: bool,
    ) -> Result<Vec<F>, StoreFileError> {
        let ratio = if may_use_off_peak {
            settings.off_peak_compaction_ratio()
        } else {
            settings.compaction_ratio()
        };
        let count = candidates.len();
        let min_files = settings.min_files_to_compact().max(1);
        let max_files = settings.max_files_to_compact();

        let sizes = candidates
            .iter()
            .map(StoreFile::byte_len)
            .collect::<Result<Vec<_>, _>>()?;
        let mut prefix = vec![0u128; count + 1];
        for (i, size) in sizes.iter().enumerate() {
            prefix[i + 1] = prefix[i] + u128::from(*size);
        }
        let max_compact_size = u128::from(settings.max_compact_size());
        let min_compact_size = u128::from(settings.min_compact_size());

        let mut best: Option<Window> = None;
        let mut smallest: Option<Window> = None;
        let mut examined = 0usize;
        let mut admissible = 0usize;
        for start in 0..count {
            let longest = max_files.min(count - start);
            for len in min_files..=longest {
                let window = Window {
                    start,
                    end: start + len,
                    bytes: prefix[start + len] - prefix[start],
                };
                examined += 1;
                if may_be_stuck && smallest.map_or(true, |s| window.bytes < s.bytes) {
                    smallest = Some(window);
                }
                if window.bytes > max_compact_size {
                    continue;
                }
                if window.bytes >= min_compact_size
                    && !files_in_ratio(&sizes[window.start..window.end], window.bytes, ratio)
                {
                    continue;
                }
                admissible += 1;
                if is_better_selection(best, window, may_be_stuck) {
                    best = Some(window);
                }
            }
        }

        let chosen = match best {
            Some(window) => Some(window),
            None if may_be_stuck => smallest,
            None => None,
        };
        log_debug!(
            component = "exploring",
            event = "windows_examined",
            candidates = count,
            examined = examined,
            admissible = admissible,
            selected = chosen.map_or(0, |w| w.len()),
            stuck_fallback = best.is_none() && chosen.is_some(),
        );
        match chosen {
            Some(window) => {
                candidates.truncate(window.end);
                candidates.drain(..window.start);
            }
            None => candidates.clear(),
        }
        Ok(candidates)
    }
}

/// Every file must be no larger than `ratio` times the rest of the window.
fn files_in_ratio(sizes: &[u64], total: u128, ratio: f64) -> bool {
    if sizes.len() < 2 {
        return true;
    }
    sizes
        .iter()
        .all(|&size| size as f64 <= (total - u128::from(size)) as f64 * ratio)
}

fn is_better_selection(best: Option<Window>, candidate: Window, may_be_stuck: bool) -> bool {
    let Some(best) = best else {
        return true;
    };
    if may_be_stuck && best.bytes > 0 && candidate.bytes > 0 {
        // A stuck store wants to shed the most files per byte rewritten.
        let best_quality = best.len() as f64 / best.bytes as f64;
        let quality = candidate.len() as f64 / candidate.bytes as f64;
        return quality > best_quality * STUCK_QUALITY_THRESHOLD;
    }
    candidate.len() > best.len() || (candidate.len() == best.len() && candidate.bytes < best.bytes)
}

impl SelectionStrategy for ExploringStrategy {
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
