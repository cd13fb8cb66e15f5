//! Cross-trace overlap pruning and record re-emission: the second half of
//! the pruning engine, operating on the [`TraceGroup`] a `mseed-prune-select`
//! run produced.
extern crate fnv;
#[cfg(test)]
extern crate mseed_prune_select;
#[cfg(test)]
extern crate tempfile;

pub mod emitter;
pub mod pruner;

pub use emitter::{EmitReport, Emitter, MemoryArchive};
pub use pruner::prune;

use mseed_prune_core::codec::Codec;
use mseed_prune_core::errors::PruneError;
use mseed_prune_core::settings::{Context, OpenFileBudget};
use mseed_prune_core::tracegroup::TraceGroup;

/// Run the full prune-then-emit pipeline over an already-indexed
/// [`TraceGroup`] (§4.3-§4.6): sort has already happened during indexing,
/// so this just prunes and emits.
pub fn run<C: Codec, W: std::io::Write, B: OpenFileBudget>(
    group: &mut TraceGroup,
    codec: &C,
    ctx: &Context,
    output: &mut W,
    budget: &mut B,
) -> Result<EmitReport, PruneError> {
    prune(group, ctx.prune_mode, &ctx.tolerances, ctx.best_quality);
    let mut emitter = Emitter::new(codec);
    emitter.emit(group, output, budget)
}
