//! The Selector (§4.2 steps 1-3): time-window and match/reject regex
//! filters applied to each record before it is handed to the TraceGroup.
use mseed_prune_core::codec::Matcher;
use mseed_prune_core::settings::{Context, PruneMode};
use mseed_prune_core::time::Time;

/// Holds the already-*compiled* match/reject patterns (compilation itself
/// -- building a `Regex` from a CLI flag or `@file` compound pattern -- is
/// an external-collaborator concern, §1). Any [`Matcher`] works here, so
/// tests can supply a stub without pulling in `regex`.
#[derive(Default)]
pub struct Selector {
    pub match_pattern: Option<Box<dyn Matcher>>,
    pub reject_pattern: Option<Box<dyn Matcher>>,
}

impl Selector {
    pub fn new() -> Self {
        Selector {
            match_pattern: None,
            reject_pattern: None,
        }
    }

    pub fn with_match(mut self, m: Box<dyn Matcher>) -> Self {
        self.match_pattern = Some(m);
        self
    }

    pub fn with_reject(mut self, m: Box<dyn Matcher>) -> Self {
        self.reject_pattern = Some(m);
        self
    }

    /// §4.2 steps 2-3: keep the record unless `match` is set and fails, or
    /// `reject` is set and succeeds.
    pub fn allows_key(&self, key: &str) -> bool {
        if let Some(m) = &self.match_pattern {
            if !m.is_match(key) {
                return false;
            }
        }
        if let Some(m) = &self.reject_pattern {
            if m.is_match(key) {
                return false;
            }
        }
        true
    }
}

/// §4.2 step 1: whether a record outside the configured time window should
/// be dropped immediately. Sample-mode pruning defers to per-record
/// trimming instead of an outright drop.
pub fn window_drops(ctx: &Context, start: Time, end: Time) -> bool {
    if ctx.prune_mode == PruneMode::Sample {
        return false;
    }
    if let Some(ws) = ctx.window_start {
        if start < ws {
            return true;
        }
    }
    if let Some(we) = ctx.window_end {
        if end > we {
            return true;
        }
    }
    false
}
