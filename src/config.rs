//! Resolution of compaction tunables into a typed settings snapshot.
//!
//! Tunables live in a flat namespace under [`CONFIG_PREFIX`]. Resolution
//! performs type coercion only: out-of-range combinations (for example
//! `min > max`) are admitted and left for the selection stages to survive.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    hash::BuildHasher,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use crate::{
    compaction::StrategyKind,
    error::ConfigError,
    observability::{log_info, log_warn},
    store::StoreConfigInfo,
};

/// Prefix shared by every compaction tunable.
pub const CONFIG_PREFIX: &str = "store.compaction.";
/// Lower bound (bytes) below which files are selected without a ratio test.
pub const MIN_SIZE_KEY: &str = "store.compaction.min.size";
/// Upper bound (bytes) on a file considered by minor compactions.
pub const MAX_SIZE_KEY: &str = "store.compaction.max.size";
/// Minimum number of files in a minor compaction.
pub const MIN_FILES_KEY: &str = "store.compaction.min";
/// Historical name of [`MIN_FILES_KEY`].
pub const DEPRECATED_MIN_FILES_KEY: &str = "store.compaction_threshold";
/// Maximum number of files in a minor compaction.
pub const MAX_FILES_KEY: &str = "store.compaction.max";
/// Selection ratio during peak hours.
pub const RATIO_KEY: &str = "store.compaction.ratio";
/// Selection ratio during off-peak hours.
pub const OFF_PEAK_RATIO_KEY: &str = "store.compaction.ratio.offpeak";
/// Byte threshold separating small from large compactions.
pub const THROTTLE_POINT_KEY: &str = "store.compaction.throttle";
/// Period between major compactions, in milliseconds.
pub const MAJOR_PERIOD_KEY: &str = "store.compaction.major.period.millis";
/// Fraction of the major period used as jitter.
pub const MAJOR_JITTER_KEY: &str = "store.compaction.major.jitter";
/// Block locality under which a single major-compacted file is compacted again.
pub const MIN_LOCALITY_KEY: &str = "store.compaction.min.locality.to.skip.major";
/// Age (milliseconds) after which tiered windows are no longer compacted.
pub const MAX_AGE_MILLIS_KEY: &str = "store.compaction.date.tiered.max.storefile.age.millis";
/// Size of the first tiered window, in milliseconds.
pub const BASE_WINDOW_MILLIS_KEY: &str = "store.compaction.date.tiered.base.window.millis";
/// Number of windows folded into one window of the next tier.
pub const WINDOWS_PER_TIER_KEY: &str = "store.compaction.date.tiered.windows.per.tier";
/// Files required in the incoming window before it is compacted.
pub const INCOMING_WINDOW_MIN_KEY: &str = "store.compaction.date.tiered.incoming.window.min";
/// Strategy used to select files inside a tiered window.
pub const WINDOW_STRATEGY_KEY: &str = "store.compaction.date.tiered.window.strategy";
/// Whether minor compactions of a tiered window write a single output file.
pub const SINGLE_OUTPUT_FOR_MINOR_KEY: &str =
    "store.compaction.date.tiered.single.output.for.minor";

const DEFAULT_MIN_FILES: i64 = 3;
const DEFAULT_MAX_FILES: i64 = 10;
const DEFAULT_RATIO: f64 = 1.2;
const DEFAULT_OFF_PEAK_RATIO: f64 = 5.0;
const DEFAULT_MAJOR_PERIOD: Duration = Duration::from_millis(1000 * 60 * 60 * 24 * 7);
// Half the period on either side of the nominal major compaction time.
const DEFAULT_MAJOR_JITTER: f64 = 0.5;
const DEFAULT_BASE_WINDOW: Duration = Duration::from_millis(3_600_000 * 6);
const DEFAULT_WINDOWS_PER_TIER: i64 = 4;
const DEFAULT_INCOMING_WINDOW_MIN: i64 = 6;

/// Flat key/value view of configuration, as loaded by the caller.
pub trait ConfigSource {
    /// Raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<&str>;
}

impl<S: BuildHasher> ConfigSource for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }
}

/// Immutable compaction settings bound to one store.
///
/// The only field that can change after resolution is the minimum file
/// count, see [`CompactionSettings::set_min_files_to_compact`].
#[derive(Debug)]
pub struct CompactionSettings {
    min_compact_size: u64,
    max_compact_size: u64,
    min_files_to_compact: AtomicUsize,
    max_files_to_compact: usize,
    compaction_ratio: f64,
    off_peak_compaction_ratio: f64,
    throttle_point: u64,
    major_compaction_period: Duration,
    major_compaction_jitter: f64,
    min_locality_to_force_compact: f64,
    max_store_file_age: Duration,
    base_window: Duration,
    windows_per_tier: usize,
    incoming_window_min: usize,
    window_strategy: StrategyKind,
    single_output_for_minor_compaction: bool,
}

impl CompactionSettings {
    /// Resolve settings for one store from `source`.
    ///
    /// Count and size bounds are resolved before the throttle point because
    /// its default is derived from them.
    pub fn resolve<C>(source: &C, store: &dyn StoreConfigInfo) -> Result<Self, ConfigError>
    where
        C: ConfigSource + ?Sized,
    {
        let reader = Reader { source };
        let flush_size = store.memstore_flush_size();

        let max_compact_size = reader.bytes(MAX_SIZE_KEY)?.unwrap_or(u64::MAX);
        let min_compact_size = reader.bytes(MIN_SIZE_KEY)?.unwrap_or(flush_size);
        let min_files = match reader.integer(MIN_FILES_KEY)? {
            Some(value) => value,
            None => reader
                .integer(DEPRECATED_MIN_FILES_KEY)?
                .unwrap_or(DEFAULT_MIN_FILES),
        };
        let min_files_to_compact = to_count(MIN_FILES_KEY, min_files.max(2));
        let max_files_to_compact = to_count(
            MAX_FILES_KEY,
            reader.integer(MAX_FILES_KEY)?.unwrap_or(DEFAULT_MAX_FILES),
        );
        let compaction_ratio = reader.float(RATIO_KEY)?.unwrap_or(DEFAULT_RATIO);
        let off_peak_compaction_ratio = reader
            .float(OFF_PEAK_RATIO_KEY)?
            .unwrap_or(DEFAULT_OFF_PEAK_RATIO);

        let throttle_point = match reader.bytes(THROTTLE_POINT_KEY)? {
            Some(point) => point,
            None => 2u64
                .saturating_mul(max_files_to_compact as u64)
                .saturating_mul(flush_size),
        };

        let major_compaction_period = reader
            .millis(MAJOR_PERIOD_KEY)?
            .unwrap_or(DEFAULT_MAJOR_PERIOD);
        let major_compaction_jitter = reader
            .float(MAJOR_JITTER_KEY)?
            .unwrap_or(DEFAULT_MAJOR_JITTER);
        let min_locality_to_force_compact = reader.float(MIN_LOCALITY_KEY)?.unwrap_or(0.0);

        let max_store_file_age = reader
            .millis(MAX_AGE_MILLIS_KEY)?
            .unwrap_or(Duration::from_millis(u64::MAX));
        let base_window = reader
            .millis(BASE_WINDOW_MILLIS_KEY)?
            .unwrap_or(DEFAULT_BASE_WINDOW);
        let windows_per_tier = to_count(
            WINDOWS_PER_TIER_KEY,
            reader
                .integer(WINDOWS_PER_TIER_KEY)?
                .unwrap_or(DEFAULT_WINDOWS_PER_TIER),
        );
        let incoming_window_min = to_count(
            INCOMING_WINDOW_MIN_KEY,
            reader
                .integer(INCOMING_WINDOW_MIN_KEY)?
                .unwrap_or(DEFAULT_INCOMING_WINDOW_MIN),
        );
        let window_strategy = match reader.raw(WINDOW_STRATEGY_KEY) {
            Some(name) => {
                StrategyKind::from_name(name).ok_or_else(|| ConfigError::UnknownStrategy {
                    key: WINDOW_STRATEGY_KEY.to_string(),
                    value: name.to_string(),
                })?
            }
            None => StrategyKind::default(),
        };
        let single_output_for_minor_compaction =
            reader.boolean(SINGLE_OUTPUT_FOR_MINOR_KEY)?.unwrap_or(true);

        let settings = Self {
            min_compact_size,
            max_compact_size,
            min_files_to_compact: AtomicUsize::new(min_files_to_compact),
            max_files_to_compact,
            compaction_ratio,
            off_peak_compaction_ratio,
            throttle_point,
            major_compaction_period,
            major_compaction_jitter,
            min_locality_to_force_compact,
            max_store_file_age,
            base_window,
            windows_per_tier,
            incoming_window_min,
            window_strategy,
            single_output_for_minor_compaction,
        };
        log_info!(
            component = "config",
            event = "settings_resolved",
            summary = %settings,
        );
        Ok(settings)
    }

    /// Lower bound below which files are selected without a ratio test.
    pub fn min_compact_size(&self) -> u64 {
        self.min_compact_size
    }

    /// Upper bound on the size of a file considered by minor compactions.
    pub fn max_compact_size(&self) -> u64 {
        self.max_compact_size
    }

    /// Lower bound on the number of files in a minor compaction.
    pub fn min_files_to_compact(&self) -> usize {
        self.min_files_to_compact.load(Ordering::Relaxed)
    }

    /// Override the minimum file count without a full reload.
    ///
    /// The value is taken as-is; the floor applied at resolution is not re-applied.
    pub fn set_min_files_to_compact(&self, threshold: usize) {
        self.min_files_to_compact.store(threshold, Ordering::Relaxed);
        log_info!(
            component = "config",
            event = "min_files_overridden",
            min_files_to_compact = threshold,
        );
    }

    /// Upper bound on the number of files in a minor compaction.
    pub fn max_files_to_compact(&self) -> usize {
        self.max_files_to_compact
    }

    /// Selection ratio during peak hours.
    pub fn compaction_ratio(&self) -> f64 {
        self.compaction_ratio
    }

    /// Selection ratio during off-peak hours.
    pub fn off_peak_compaction_ratio(&self) -> f64 {
        self.off_peak_compaction_ratio
    }

    /// Byte threshold classifying compactions as small or large.
    pub fn throttle_point(&self) -> u64 {
        self.throttle_point
    }

    /// Nominal period between major compactions.
    pub fn major_compaction_period(&self) -> Duration {
        self.major_compaction_period
    }

    /// Fraction of the period by which the major compaction time is jittered.
    pub fn major_compaction_jitter(&self) -> f64 {
        self.major_compaction_jitter
    }

    /// Locality below which an aged single-file store is still major compacted.
    pub fn min_locality_to_force_compact(&self) -> f64 {
        self.min_locality_to_force_compact
    }

    /// Age after which tiered windows are no longer compacted.
    pub fn max_store_file_age(&self) -> Duration {
        self.max_store_file_age
    }

    /// Size of the first tiered window.
    pub fn base_window(&self) -> Duration {
        self.base_window
    }

    /// Windows folded into one window of the next tier.
    pub fn windows_per_tier(&self) -> usize {
        self.windows_per_tier
    }

    /// Files required in the incoming window before it is compacted.
    pub fn incoming_window_min(&self) -> usize {
        self.incoming_window_min
    }

    /// Strategy used to select files inside a window.
    pub fn window_strategy(&self) -> StrategyKind {
        self.window_strategy
    }

    /// Whether minor compactions write a single output file.
    pub fn single_output_for_minor_compaction(&self) -> bool {
        self.single_output_for_minor_compaction
    }
}

impl Clone for CompactionSettings {
    fn clone(&self) -> Self {
        Self {
            min_compact_size: self.min_compact_size,
            max_compact_size: self.max_compact_size,
            min_files_to_compact: AtomicUsize::new(self.min_files_to_compact()),
            max_files_to_compact: self.max_files_to_compact,
            compaction_ratio: self.compaction_ratio,
            off_peak_compaction_ratio: self.off_peak_compaction_ratio,
            throttle_point: self.throttle_point,
            major_compaction_period: self.major_compaction_period,
            major_compaction_jitter: self.major_compaction_jitter,
            min_locality_to_force_compact: self.min_locality_to_force_compact,
            max_store_file_age: self.max_store_file_age,
            base_window: self.base_window,
            windows_per_tier: self.windows_per_tier,
            incoming_window_min: self.incoming_window_min,
            window_strategy: self.window_strategy,
            single_output_for_minor_compaction: self.single_output_for_minor_compaction,
        }
    }
}

impl fmt::Display for CompactionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size [{}, {}); files [{}, {}); ratio {:.6}; off-peak ratio {:.6}; throttle point {}; \
             major period {}, major jitter {:.6}, min locality to compact {:.6}; tiered \
             compaction: max_age {}, base window in milliseconds {}, windows per tier {}, \
             incoming window threshold {}, window strategy {}, single output for minor {}",
            self.min_compact_size,
            self.max_compact_size,
            self.min_files_to_compact(),
            self.max_files_to_compact,
            self.compaction_ratio,
            self.off_peak_compaction_ratio,
            self.throttle_point,
            self.major_compaction_period.as_millis(),
            self.major_compaction_jitter,
            self.min_locality_to_force_compact,
            self.max_store_file_age.as_millis(),
            self.base_window.as_millis(),
            self.windows_per_tier,
            self.incoming_window_min,
            self.window_strategy,
            self.single_output_for_minor_compaction,
        )
    }
}

struct Reader<'a, C: ?Sized> {
    source: &'a C,
}

impl<C: ConfigSource + ?Sized> Reader<'_, C> {
    fn raw(&self, key: &str) -> Option<&str> {
        self.source.get(key).map(str::trim)
    }

    fn integer(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        self.parse(key, "an integer")
    }

    fn float(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.parse(key, "a floating point number")
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.parse(key, "`true` or `false`")
    }

    fn bytes(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        Ok(self.integer(key)?.map(|value| to_unsigned(key, value)))
    }

    fn millis(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self
            .integer(key)?
            .map(|value| Duration::from_millis(to_unsigned(key, value))))
    }

    fn parse<T: std::str::FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(raw) = self.raw(key) else {
            return Ok(None);
        };
        raw.parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected,
            })
    }
}

fn to_unsigned(key: &str, value: i64) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| {
        log_warn!(
            component = "config",
            event = "negative_value_clamped",
            key = key,
            value = value,
        );
        0
    })
}

fn to_count(key: &str, value: i64) -> usize {
    usize::try_from(to_unsigned(key, value)).unwrap_or(usize::MAX)
}
