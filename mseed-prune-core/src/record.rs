//! [`Record`] descriptors, the [`RecordMap`] that orders them per trace, and
//! [`Trace`], the logical per-channel aggregate they belong to.
use crate::keys::TraceKey;
use crate::quality::Quality;
use crate::time::Time;

/// Index of a [`crate::file::File`] in a [`crate::tracegroup::TraceGroup`]'s
/// file arena -- the Rust translation of the original's raw `File*`
/// back-pointer (see SPEC_FULL.md design notes).
pub type FileRef = usize;

/// A record descriptor: everything about one on-disk Mini-SEED record
/// needed for assembly, pruning, and re-emission. Does not hold the record's
/// bytes -- those are re-read from `file_ref` at emit time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    pub file_ref: FileRef,
    pub byte_offset: u64,
    /// Record length in bytes. Zero marks the record dropped (never emitted).
    pub length: usize,
    pub start: Time,
    pub end: Time,
    pub quality: Quality,
    pub sample_rate: f64,
    /// First sample time to retain after trimming, if set.
    pub newstart: Option<Time>,
    /// Last sample time to retain after trimming, if set.
    pub newend: Option<Time>,
}

impl Record {
    pub fn new(
        file_ref: FileRef,
        byte_offset: u64,
        length: usize,
        start: Time,
        end: Time,
        quality: Quality,
        sample_rate: f64,
    ) -> Self {
        Record {
            file_ref,
            byte_offset,
            length,
            start,
            end,
            quality,
            sample_rate,
            newstart: None,
            newend: None,
        }
    }

    /// `true` once `length` has been zeroed by the Pruner.
    pub fn is_dropped(&self) -> bool {
        self.length == 0
    }

    /// Mark this record as dropped. Terminal: once set there is no path
    /// back (invariant 3).
    pub fn drop_record(&mut self) {
        self.length = 0;
    }

    /// The effective start used by continuity/trim math: `newstart` if set,
    /// else `start`.
    pub fn eff_start(&self) -> Time {
        self.newstart.unwrap_or(self.start)
    }

    /// The effective end used by continuity/trim math: `newend` if set,
    /// else `end`.
    pub fn eff_end(&self) -> Time {
        self.newend.unwrap_or(self.end)
    }

    /// Validate invariant 2: if set, `newstart`/`newend` lie strictly inside
    /// `(start, end)`, and `newstart < newend` if both are set.
    pub fn trim_is_valid(&self) -> bool {
        if let Some(ns) = self.newstart {
            if !(ns > self.start && ns < self.end) {
                return false;
            }
        }
        if let Some(ne) = self.newend {
            if !(ne > self.start && ne < self.end) {
                return false;
            }
        }
        if let (Some(ns), Some(ne)) = (self.newstart, self.newend) {
            if !(ns < ne) {
                return false;
            }
        }
        true
    }
}

/// Where a newly-placed record (or splitter-produced chain) was spliced
/// relative to the existing [`RecordMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// The trace itself was just created.
    New,
    /// Appended after the current last record.
    Append,
    /// Prepended before the current first record.
    Prepend,
}

/// A time-ordered sequence of [`Record`]s belonging to one [`Trace`].
///
/// Translated from the original's doubly-linked list (with O(1) append/
/// prepend at either end) into a `Vec`-backed arena: indices stay stable
/// across mutation because records are never removed, only marked dropped
/// (§3 invariant 3), and insertion only ever happens at the two ends or via
/// an atomic splice of a splitter-produced sub-chain (§9).
#[derive(Debug, Clone, Default)]
pub struct RecordMap {
    records: Vec<Record>,
}

impl RecordMap {
    pub fn new() -> Self {
        RecordMap { records: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Record> {
        self.records.iter_mut()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    pub fn get(&self, idx: usize) -> Option<&Record> {
        self.records.get(idx)
    }

    /// Append one record at the tail.
    pub fn push_back(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Prepend one record at the head.
    pub fn push_front(&mut self, record: Record) {
        self.records.insert(0, record);
    }

    /// Splice a whole splitter-produced chain atomically, at the end
    /// `whence` selected (§9, resolved open question).
    pub fn splice_chain(&mut self, chain: Vec<Record>, whence: Whence) {
        match whence {
            Whence::Prepend => {
                let mut new_records = chain;
                new_records.extend(std::mem::take(&mut self.records));
                self.records = new_records;
            }
            Whence::Append | Whence::New => {
                self.records.extend(chain);
            }
        }
    }

    /// Insert `record` immediately after index `after`, used by the
    /// Splitter (§4.5 step 3) to place a clone next to its origin.
    pub fn insert_after(&mut self, after: usize, record: Record) {
        self.records.insert(after + 1, record);
    }
}

/// A logical per-channel trace: a [`TraceKey`], its aggregate bounding
/// times, and the [`RecordMap`] of records that constitute it.
#[derive(Debug, Clone)]
pub struct Trace {
    pub key: TraceKey,
    pub start: Time,
    pub end: Time,
    pub map: RecordMap,
}

impl Trace {
    /// A brand-new trace seeded from its first record.
    pub fn new(key: TraceKey, start: Time, end: Time) -> Self {
        Trace {
            key,
            start,
            end,
            map: RecordMap::new(),
        }
    }

    /// Extend the trace's bounding times to include `[start, end]`.
    pub fn extend_bounds(&mut self, start: Time, end: Time) {
        if start < self.start {
            self.start = start;
        }
        if end > self.end {
            self.end = end;
        }
    }

    /// The trace's bounding-interval length in ticks (`end - start`), used
    /// as the trace "length" tie-break in the Pruner's priority comparison
    /// (§4.4 step 3) -- the time span a trace covers, not its record count.
    pub fn bounding_interval_length(&self) -> i64 {
        self.end.sub(self.start)
    }
}
