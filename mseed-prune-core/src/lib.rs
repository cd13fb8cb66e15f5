//! Core data model for the Mini-SEED trace-assembly and overlap-pruning
//! pipeline. This crate has no notion of files or sinks beyond the
//! [`codec::Codec`] boundary: it owns the [`Time`](time::Time) model, the
//! [`record::Record`]/[`record::RecordMap`]/[`record::Trace`] data model,
//! [`tracegroup::TraceGroup`] assembly, and the [`splitter`] algorithm.
//! `mseed-prune-select` and `mseed-prune-emit` build the indexing and
//! emitting phases on top of it.
#![allow(clippy::derive_partial_eq_without_eq)]
#[macro_use]
extern crate num_derive;

#[cfg(any(feature = "to_json", feature = "serde"))]
extern crate serde;
#[cfg(feature = "to_json")]
extern crate serde_json;

pub mod codec;
pub mod errors;
pub mod file;
pub mod keys;
pub mod quality;
pub mod record;
pub mod settings;
pub mod splitter;
pub mod time;
pub mod tracegroup;

pub use errors::PruneError;
pub use file::File;
pub use keys::{ChannelKey, TraceKey};
pub use quality::Quality;
pub use record::{FileRef, Record, RecordMap, Trace, Whence};
pub use settings::{Context, NoOpBudget, OpenFileBudget, PruneMode, Tolerances};
pub use time::Time;
pub use tracegroup::TraceGroup;
