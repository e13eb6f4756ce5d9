//! Deterministic jitter for periodic major compactions.

use std::time::Duration;

use fastrand::Rng;

use crate::{
    config::CompactionSettings, file_set::deterministic_seed, observability::log_debug,
    store::StoreFile,
};

/// Time until the next major compaction of `files` is due.
///
/// With a positive period and jitter fraction the result lands uniformly in
/// `[period - jitter, period + jitter]` where `jitter = round(period * fraction)`.
/// The draw is seeded from the file set, so every store computes a different
/// instant after a coordinated restart while the same file set always yields
/// the same answer. An empty file set yields zero: nothing to major compact.
pub fn next_major_compact_time<F: StoreFile>(
    settings: &CompactionSettings,
    files: &[F],
) -> Duration {
    let period = settings.major_compaction_period();
    let period_ms = i128::try_from(period.as_millis()).unwrap_or(i128::MAX);
    if period_ms <= 0 {
        return period;
    }
    let fraction = settings.major_compaction_jitter();
    if fraction.is_nan() || fraction <= 0.0 {
        return period;
    }
    // `as` saturates for out-of-range floats.
    let jitter = (period_ms as f64 * fraction).round() as i128;
    let Some(seed) = deterministic_seed(files) else {
        return Duration::ZERO;
    };
    let draw = Rng::with_seed(seed).f64();
    let offset = (2.0 * jitter as f64 * draw).round() as i128;
    let millis = (period_ms + jitter - offset).clamp(0, i128::from(u64::MAX));
    log_debug!(
        component = "schedule",
        event = "major_compaction_scheduled",
        files = files.len(),
        period_ms = period.as_millis() as u64,
        jitter_ms = jitter as i64,
        next_ms = millis as u64,
    );
    Duration::from_millis(millis as u64)
}
