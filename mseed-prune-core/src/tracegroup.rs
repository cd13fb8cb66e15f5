//! [`TraceGroup`]: the collection of [`Trace`]s assembled during indexing,
//! plus the file arena every [`crate::record::Record`] back-references by
//! [`crate::record::FileRef`] (§3, §4.3, §9 design notes).
use crate::file::File;
use crate::keys::TraceKey;
use crate::record::{FileRef, Record, Trace, Whence};
use crate::settings::Tolerances;

/// Owns every [`Trace`] produced by indexing, and the file arena their
/// records reference. Built fresh once per run (or once per POD batch).
#[derive(Debug, Clone, Default)]
pub struct TraceGroup {
    traces: Vec<Trace>,
    files: Vec<File>,
}

impl TraceGroup {
    pub fn new() -> Self {
        TraceGroup::default()
    }

    /// Register a file and return its [`FileRef`] for use in [`Record`]s.
    pub fn add_file(&mut self, path: impl Into<String>) -> FileRef {
        self.files.push(File::new(path));
        self.files.len() - 1
    }

    pub fn file(&self, idx: FileRef) -> &File {
        &self.files[idx]
    }

    pub fn file_mut(&mut self, idx: FileRef) -> &mut File {
        &mut self.files[idx]
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn traces_mut(&mut self) -> &mut [Trace] {
        &mut self.traces
    }

    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Find the trace matching `key` within tolerance, and which `record`
    /// joins with time continuity (§4.3). Returns the trace's index if one
    /// is found.
    fn find_matching_trace(
        &self,
        key: &TraceKey,
        record: &Record,
        tol: &Tolerances,
    ) -> Option<usize> {
        let rate_tol = tol.sample_rate_tol;
        let timetol = tol.time_tol_for_rate(key.sample_rate);
        self.traces.iter().position(|t| {
            if !t.key.matches(key, rate_tol) {
                return false;
            }
            let joins_at_end = (record.start.sub(t.end)).abs() <= timetol;
            let joins_at_start = (t.start.sub(record.end)).abs() <= timetol;
            let overlaps = record.start <= t.end && record.end >= t.start;
            joins_at_end || joins_at_start || overlaps
        })
    }

    /// Place `record` (already built with its final `key`) into a matching
    /// trace, creating one if none matches (§4.3). Returns the trace's
    /// index in the group and the [`Whence`] the indexer should use when
    /// splicing.
    pub fn place(&mut self, key: TraceKey, record: Record, tol: &Tolerances) -> (usize, Whence) {
        let (idx, whence) = self.locate_or_create(key, &record, tol);
        match whence {
            Whence::Append => self.traces[idx].map.push_back(record),
            Whence::Prepend => {
                self.traces[idx].map.push_front(record);
                self.files[record.file_ref].record_reordered();
            }
            Whence::New => self.traces[idx].map.push_back(record),
        }
        (idx, whence)
    }

    /// Find or create the trace `record` belongs to, and decide the
    /// [`Whence`] it would be spliced at, without touching the trace's
    /// [`RecordMap`]. Used by the indexer when a splitter-produced chain
    /// must be spliced as one atomic unit (§4.2 step 8, §9).
    pub fn locate_or_create(
        &mut self,
        key: TraceKey,
        record: &Record,
        tol: &Tolerances,
    ) -> (usize, Whence) {
        if let Some(idx) = self.find_matching_trace(&key, record, tol) {
            let trace = &mut self.traces[idx];
            let whence = if record.start >= trace.end {
                Whence::Append
            } else if record.end <= trace.start {
                Whence::Prepend
            } else if (record.start.sub(trace.end)).abs() <= (trace.start.sub(record.end)).abs() {
                // Degenerate zero-span record: choose by proximity (§4.2 step 5).
                Whence::Append
            } else {
                Whence::Prepend
            };
            trace.extend_bounds(record.start, record.end);
            (idx, whence)
        } else {
            let trace = Trace::new(key, record.start, record.end);
            self.traces.push(trace);
            (self.traces.len() - 1, Whence::New)
        }
    }

    /// Splice a (possibly multi-record) chain into the trace at `idx`, at
    /// the given `whence`. `Whence::Prepend` increments that file's
    /// `reordered` counter for each record in the chain.
    pub fn splice_chain(&mut self, idx: usize, chain: Vec<Record>, whence: Whence) {
        if whence == Whence::Prepend {
            for r in &chain {
                self.files[r.file_ref].record_reordered();
            }
        }
        self.traces[idx].map.splice_chain(chain, whence);
    }

    pub fn trace_mut(&mut self, idx: usize) -> &mut Trace {
        &mut self.traces[idx]
    }

    /// Sort traces by (channel-key lexicographic, sample rate ascending,
    /// start ascending, end descending), as required before pruning (§4.3).
    pub fn sort_for_pruning(&mut self) {
        self.traces.sort_by(|a, b| {
            a.key
                .channel
                .cmp(&b.key.channel)
                .then_with(|| a.key.sample_rate.partial_cmp(&b.key.sample_rate).unwrap())
                .then_with(|| a.start.cmp(&b.start))
                .then_with(|| b.end.cmp(&a.end))
        });
    }
}
