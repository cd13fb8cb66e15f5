//! [`Tolerances`] and [`Context`]: the settings layer that replaces the
//! mutable globals (verbosity, tolerances, filter regexes, scratch buffer)
//! of the original tool with plain, threaded-through data.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::time::{default_time_tolerance, sample_period, HPTMODULUS};

/// Continuity tolerances used by [`crate::keys::TraceKey::matches`] and by
/// the Pruner's segment-gap test.
///
/// `timetol` defaults to half a sample period for the rate in question, and
/// is therefore not a single crate-wide constant: [`Tolerances::time_tol_for_rate`]
/// computes it on demand unless an explicit override was set.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Tolerances {
    override_time_tol: Option<i64>,
    pub sample_rate_tol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            override_time_tol: None,
            sample_rate_tol: 0.0001,
        }
    }
}

impl Tolerances {
    /// Override the time tolerance (in seconds) used for every rate,
    /// rather than deriving it per-rate from the sample period.
    pub fn set_time_tol_seconds(&mut self, seconds: f64) {
        self.override_time_tol = Some((seconds * HPTMODULUS as f64).round() as i64);
    }

    /// The time tolerance, in ticks, applicable to a trace at `rate` Hz.
    pub fn time_tol_for_rate(&self, rate: f64) -> i64 {
        self.override_time_tol
            .unwrap_or_else(|| default_time_tolerance(rate))
    }

    /// The sample period, in ticks, for `rate` Hz. Convenience passthrough
    /// so callers need not import [`crate::time::sample_period`] directly.
    pub fn sample_period(&self, rate: f64) -> i64 {
        sample_period(rate)
    }
}

/// Whether pruning operates at record granularity, sample granularity, or
/// not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum PruneMode {
    None,
    Record,
    Sample,
}

impl Default for PruneMode {
    fn default() -> Self {
        PruneMode::None
    }
}

/// Everything the pipeline needs that would otherwise be a mutable global:
/// tolerances, prune mode, split unit, quality-sensitivity, and the time
/// window. Threaded through RecordIndex, TraceGroup, Pruner, and Emitter by
/// reference.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Context {
    pub tolerances: Tolerances,
    pub prune_mode: PruneMode,
    pub split_unit: crate::time::SplitUnit,
    /// When `true`, traces are grouped by quality as well as by channel
    /// (matching `-E`/equal-qualities semantics when `false`).
    pub quality_sensitive: bool,
    /// Whether the Pruner's priority comparison considers quality at all
    /// (§4.4 step 3). `true` (the default) matches the original's `-E`
    /// flag being off: quality outranks bounding-interval length. Setting
    /// this to `false` reproduces `-E`/equal-qualities mode, where only
    /// length (and group order, for ties) decides priority.
    pub best_quality: bool,
    pub window_start: Option<crate::time::Time>,
    pub window_end: Option<crate::time::Time>,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            tolerances: Tolerances::default(),
            prune_mode: PruneMode::default(),
            split_unit: crate::time::SplitUnit::default(),
            quality_sensitive: false,
            best_quality: true,
            window_start: None,
            window_end: None,
        }
    }
}

impl Context {
    #[cfg(feature = "to_json")]
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }

    pub fn set_window(&mut self, start: Option<crate::time::Time>, end: Option<crate::time::Time>) {
        self.window_start = start;
        self.window_end = end;
    }

    pub fn set_prune_mode(&mut self, mode: PruneMode) {
        self.prune_mode = mode;
    }

    pub fn set_split_unit(&mut self, unit: crate::time::SplitUnit) {
        self.split_unit = unit;
    }

    pub fn set_quality_sensitive(&mut self, on: bool) {
        self.quality_sensitive = on;
    }

    /// Set whether the Pruner's priority comparison considers quality
    /// (`false` reproduces `-E`/equal-qualities mode).
    pub fn set_best_quality(&mut self, on: bool) {
        self.best_quality = on;
    }
}

/// External-collaborator hook for raising the process's open-file-descriptor
/// limit before the Emitter starts opening many input files concurrently
/// (§5). Raising `rlimit`s is platform-specific and out of THE CORE's scope;
/// a no-op default is provided for platforms and tests where it is
/// meaningless.
pub trait OpenFileBudget {
    /// Called once before the first file is opened for emit, with the total
    /// number of distinct files the run will touch. Returns `true` if the
    /// budget is believed sufficient, `false` if the caller should expect
    /// opens to fail under load (the Emitter proceeds regardless; see §5/§7).
    fn ensure_budget(&mut self, file_count: usize) -> bool;
}

/// The default [`OpenFileBudget`]: never attempts to raise anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpBudget;

impl OpenFileBudget for NoOpBudget {
    fn ensure_budget(&mut self, _file_count: usize) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_time_tol_derives_from_rate() {
        let tol = Tolerances::default();
        assert_eq!(tol.time_tol_for_rate(1.0), HPTMODULUS / 2);
    }

    #[test]
    fn override_time_tol_wins() {
        let mut tol = Tolerances::default();
        tol.set_time_tol_seconds(2.0);
        assert_eq!(tol.time_tol_for_rate(100.0), 2 * HPTMODULUS);
    }

    #[test]
    fn noop_budget_always_true() {
        let mut b = NoOpBudget;
        assert!(b.ensure_budget(10_000));
    }
}
