//! Pluggable final-selection strategies.

use std::{fmt, time::Duration};

use crate::{
    compaction::{
        exploring::ExploringStrategy,
        ratio::RatioStrategy,
        request::{CompactionRequest, SelectionParams},
        schedule,
    },
    config::CompactionSettings,
    error::SelectionError,
    store::{StoreConfigInfo, StoreFile},
};

/// Policy-specific half of compaction selection.
///
/// The shared pipeline sorts and filters candidates, decides whether a major
/// compaction should be attempted, then hands the remaining candidates to a
/// strategy which picks the final contiguous subset.
pub trait SelectionStrategy {
    /// Pick the files to compact among `candidates` (sorted oldest first).
    ///
    /// Implementations must return a contiguous run of `candidates`.
    fn build_request<F>(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: Vec<F>,
        params: SelectionParams,
    ) -> Result<CompactionRequest<F>, SelectionError>
    where
        F: StoreFile + Clone;

    /// `true` if `files` are due for a major compaction.
    fn should_perform_major_compaction<F>(
        &self,
        ctx: &SelectionContext<'_>,
        files: &[F],
    ) -> Result<bool, SelectionError>
    where
        F: StoreFile;
}

/// Read-only state handed to a strategy for one selection call.
#[derive(Clone, Copy)]
pub struct SelectionContext<'a> {
    settings: &'a CompactionSettings,
    store: &'a dyn StoreConfigInfo,
    now_millis: u64,
}

impl<'a> SelectionContext<'a> {
    /// Bundle settings, store facts and the current time.
    pub fn new(
        settings: &'a CompactionSettings,
        store: &'a dyn StoreConfigInfo,
        now_millis: u64,
    ) -> Self {
        Self {
            settings,
            store,
            now_millis,
        }
    }

    /// Settings of the store being compacted.
    pub fn settings(&self) -> &'a CompactionSettings {
        self.settings
    }

    /// Scalar facts about the store being compacted.
    pub fn store(&self) -> &'a dyn StoreConfigInfo {
        self.store
    }

    /// Wall-clock time of the selection call.
    pub fn now_millis(&self) -> u64 {
        self.now_millis
    }

    /// Time until the next major compaction of `files` is due.
    pub fn next_major_compact_time<F: StoreFile>(&self, files: &[F]) -> Duration {
        schedule::next_major_compact_time(self.settings, files)
    }
}

/// Builtin strategies selectable via configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Skip leading files that are too large relative to their successors.
    Ratio,
    /// Search every admissible window and keep the best one.
    #[default]
    Exploring,
}

impl StrategyKind {
    /// Parse a configured strategy name (case insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ratio" => Some(Self::Ratio),
            "exploring" => Some(Self::Exploring),
            _ => None,
        }
    }

    /// Configuration name of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::Exploring => "exploring",
        }
    }

    /// Build a concrete strategy for the selected kind.
    pub fn build(self) -> BuiltinStrategy {
        match self {
            Self::Ratio => BuiltinStrategy::Ratio(RatioStrategy::new()),
            Self::Exploring => BuiltinStrategy::Exploring(ExploringStrategy::new()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy enum keeping a concrete builtin around behind one type.
#[derive(Clone, Debug)]
pub enum BuiltinStrategy {
    /// Ratio-based selection.
    Ratio(RatioStrategy),
    /// Exploring selection.
    Exploring(ExploringStrategy),
}

impl Default for BuiltinStrategy {
    fn default() -> Self {
        StrategyKind::default().build()
    }
}

impl BuiltinStrategy {
    /// Kind this strategy was built from.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Ratio(_) => StrategyKind::Ratio,
            Self::Exploring(_) => StrategyKind::Exploring,
        }
    }
}

impl SelectionStrategy for BuiltinStrategy {
    fn build_request<F>(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: Vec<F>,
        params: SelectionParams,
    ) -> Result<CompactionRequest<F>, SelectionError>
    where
        F: StoreFile + Clone,
    {
        match self {
            Self::Ratio(strategy) => strategy.build_request(ctx, candidates, params),
            Self::Exploring(strategy) => strategy.build_request(ctx, candidates, params),
        }
    }

    fn should_perform_major_compaction<F>(
        &self,
        ctx: &SelectionContext<'_>,
        files: &[F],
    ) -> Result<bool, SelectionError>
    where
        F: StoreFile,
    {
        match self {
            Self::Ratio(strategy) => strategy.should_perform_major_compaction(ctx, files),
            Self::Exploring(strategy) => strategy.should_perform_major_compaction(ctx, files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in [StrategyKind::Ratio, StrategyKind::Exploring] {
            assert_eq!(StrategyKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.build().kind(), kind);
        }
        assert_eq!(StrategyKind::from_name(" Exploring "), Some(StrategyKind::Exploring));
        assert_eq!(StrategyKind::from_name("date-tiered"), None);
        assert_eq!(BuiltinStrategy::default().kind(), StrategyKind::Exploring);
    }
}
