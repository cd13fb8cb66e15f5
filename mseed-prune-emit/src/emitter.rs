//! The Emitter (§4.6): re-reads each surviving record's bytes, repacks
//! trimmed ones via the codec, and writes the result to the configured
//! sinks while maintaining per-file statistics.
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};

use fnv::FnvHashMap;
use mseed_prune_core::codec::{ArchiveSink, Codec};
use mseed_prune_core::errors::PruneError;
use mseed_prune_core::record::FileRef;
use mseed_prune_core::settings::OpenFileBudget;
use mseed_prune_core::time::sample_period;
use mseed_prune_core::tracegroup::TraceGroup;

/// Minimum scratch buffer size (§5): "A single scratch buffer (>=16 KiB)".
pub const MIN_SCRATCH_BUFFER: usize = 16 * 1024;

/// Outcome of one emit run.
#[derive(Debug, Clone, Default)]
pub struct EmitReport {
    pub records_emitted: usize,
    pub records_dropped: usize,
    pub records_trimmed: usize,
    pub trim_violations_skipped: usize,
    pub repack_failures_skipped: usize,
    pub bytes_written: u64,
}

/// Iterates traces in group order and writes surviving records to sinks.
/// Keeps one read handle per input file open for the duration of the run
/// (§5: records from many files interleave within a trace), pooled in an
/// `FnvHashMap` the way `giga-segy-out` pools its trace lookups.
pub struct Emitter<'a, C: Codec> {
    codec: &'a C,
    open_files: FnvHashMap<FileRef, std::fs::File>,
    per_file_writers: FnvHashMap<FileRef, std::fs::File>,
    scratch: Vec<u8>,
    archives: Vec<Box<dyn ArchiveSink>>,
    quality_restamp: Option<u8>,
    replace_input: bool,
    no_backups: bool,
}

impl<'a, C: Codec> Emitter<'a, C> {
    pub fn new(codec: &'a C) -> Self {
        Emitter {
            codec,
            open_files: FnvHashMap::default(),
            per_file_writers: FnvHashMap::default(),
            scratch: vec![0u8; MIN_SCRATCH_BUFFER],
            archives: Vec::new(),
            quality_restamp: None,
            replace_input: false,
            no_backups: false,
        }
    }

    pub fn with_archive(mut self, sink: Box<dyn ArchiveSink>) -> Self {
        self.archives.push(sink);
        self
    }

    pub fn set_quality_restamp(&mut self, quality_byte: Option<u8>) {
        self.quality_restamp = quality_byte;
    }

    /// Enable replace-input mode (§4.6 step 4, §8 scenario 6): each input
    /// file is renamed to `<path>.orig` before reads start, and a fresh
    /// file at the original path receives that file's surviving records in
    /// place of the single-output sink. `no_backups` unlinks the `.orig`
    /// files once the run completes.
    pub fn set_replace_input(&mut self, replace_input: bool, no_backups: bool) {
        self.replace_input = replace_input;
        self.no_backups = no_backups;
    }

    /// Rename every registered file to `<path>.orig`, ahead of the emit
    /// loop, and record the rename on each [`mseed_prune_core::File`].
    /// Only meaningful when replace-input mode is set.
    fn prepare_replace_input(&self, group: &mut TraceGroup) -> Result<(), PruneError> {
        let n = group.file_count();
        for idx in 0..n {
            let orig_path = group.file(idx).original_path.clone();
            let backup_path = format!("{}.orig", orig_path);
            std::fs::rename(&orig_path, &backup_path)?;
            group.file_mut(idx).mark_renamed_to_orig();
        }
        Ok(())
    }

    fn writer_for(&mut self, file_ref: FileRef, path: &str) -> Result<&mut std::fs::File, PruneError> {
        if !self.per_file_writers.contains_key(&file_ref) {
            let f = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            self.per_file_writers.insert(file_ref, f);
        }
        Ok(self.per_file_writers.get_mut(&file_ref).unwrap())
    }

    fn read_handle(&mut self, file_ref: FileRef, path: &str) -> Result<&mut std::fs::File, PruneError> {
        if !self.open_files.contains_key(&file_ref) {
            let f = std::fs::File::open(path)?;
            self.open_files.insert(file_ref, f);
        }
        Ok(self.open_files.get_mut(&file_ref).unwrap())
    }

    /// Emit every surviving record in `group`, in group order, writing to
    /// `output` (the single-file sink, §4.6 step 4) and registered archive
    /// sinks. `budget` is consulted once before the first open (§5).
    pub fn emit<W: Write, B: OpenFileBudget>(
        &mut self,
        group: &mut TraceGroup,
        output: &mut W,
        budget: &mut B,
    ) -> Result<EmitReport, PruneError> {
        budget.ensure_budget(group.file_count());

        if self.replace_input {
            self.prepare_replace_input(group)?;
        }

        let mut report = EmitReport::default();
        let paths: Vec<String> = group.files().iter().map(|f| f.read_path.clone()).collect();
        let orig_paths: Vec<String> = group.files().iter().map(|f| f.original_path.clone()).collect();

        let trace_count = group.trace_count();
        for t in 0..trace_count {
            let records: Vec<_> = group.traces()[t].map.iter().copied().collect();
            for (i, record) in records.iter().enumerate() {
                if record.is_dropped() {
                    report.records_dropped += 1;
                    continue;
                }
                if record.length > self.scratch.len() {
                    return Err(PruneError::BufferOverflow {
                        length: record.length,
                        capacity: self.scratch.len(),
                    });
                }

                let path = paths[record.file_ref].clone();
                let handle = self.read_handle(record.file_ref, &path)?;
                handle.seek(SeekFrom::Start(record.byte_offset))?;
                let buf = &mut self.scratch[..record.length];
                handle.read_exact(buf)?;

                let mut bytes = buf.to_vec();
                let mut emitted_start = record.start;

                if record.newstart.is_some() || record.newend.is_some() {
                    if !record.trim_is_valid() {
                        log::warn!(
                            "trim precondition violated for record at offset {}; emitting untrimmed",
                            record.byte_offset
                        );
                        report.trim_violations_skipped += 1;
                    } else {
                        match self.repack_trimmed(record, &bytes) {
                            Ok((repacked, new_start)) => {
                                bytes = repacked;
                                emitted_start = new_start;
                                report.records_trimmed += 1;
                            }
                            Err(e) => {
                                // §7 error kind 4: a repack failure drops the
                                // record entirely rather than emitting it
                                // untrimmed.
                                log::warn!("repack failed for record at offset {}: {}", record.byte_offset, e);
                                report.repack_failures_skipped += 1;
                                continue;
                            }
                        }
                    }
                }

                if let Some(q) = self.quality_restamp {
                    let off = self.codec.quality_byte_offset();
                    if off < bytes.len() {
                        bytes[off] = q;
                    }
                }

                if self.replace_input {
                    let orig_path = orig_paths[record.file_ref].clone();
                    let writer = self.writer_for(record.file_ref, &orig_path)?;
                    writer.write_all(&bytes)?;
                } else {
                    output.write_all(&bytes)?;
                }
                for sink in &mut self.archives {
                    let key = format!("{}", record.file_ref);
                    sink.route(&key, &bytes)?;
                }

                let period = sample_period(record.sample_rate);
                let end_plus_period = record.eff_end().add(period);
                group
                    .file_mut(record.file_ref)
                    .record_emitted(emitted_start, end_plus_period, bytes.len() as u64);

                report.records_emitted += 1;
                report.bytes_written += bytes.len() as u64;
                let _ = i;
            }
        }

        self.open_files.clear();
        self.per_file_writers.clear();

        if self.replace_input && self.no_backups {
            for idx in 0..group.file_count() {
                let backup_path = format!("{}.orig", group.file(idx).original_path);
                let _ = std::fs::remove_file(&backup_path);
            }
        }

        Ok(report)
    }

    fn repack_trimmed(
        &self,
        record: &mseed_prune_core::record::Record,
        bytes: &[u8],
    ) -> Result<(Vec<u8>, mseed_prune_core::time::Time), PruneError> {
        let samples = self.codec.unpack(bytes)?;
        let period = sample_period(record.sample_rate);
        let new_start = record.newstart.unwrap_or(record.start);
        let new_end = record.newend.unwrap_or(record.end);

        // §4.6 step 2: round to the nearest sample rather than truncating,
        // so a newstart/newend off the record's own sample grid (e.g. set
        // by the Pruner from a different trace's boundary) still drops the
        // intended number of samples instead of one too few.
        let head_drop = if period > 0 {
            ((new_start.sub(record.start) as f64 / period as f64).round() as i64).max(0) as usize
        } else {
            0
        };
        let tail_drop = if period > 0 {
            ((record.end.sub(new_end) as f64 / period as f64).round() as i64).max(0) as usize
        } else {
            0
        };
        let keep_end = samples.len().saturating_sub(tail_drop);
        let trimmed_samples = if head_drop < keep_end {
            &samples[head_drop..keep_end]
        } else {
            &samples[0..0]
        };

        let raw = mseed_prune_core::codec::RawRecord {
            byte_offset: record.byte_offset,
            length: record.length,
            start: record.start,
            end: record.end,
            quality: record.quality,
            sample_rate: record.sample_rate,
            network: String::new(),
            station: String::new(),
            location: String::new(),
            channel: String::new(),
        };
        let repacked = self.codec.pack(&raw, trimmed_samples, new_start)?;
        Ok((repacked, new_start))
    }
}

/// An in-memory [`ArchiveSink`] used in tests and as the trivial
/// implementation for single-destination archiving: keys route to
/// byte buffers kept in a plain `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    pub routed: HashMap<String, Vec<u8>>,
}

impl ArchiveSink for MemoryArchive {
    fn route(&mut self, key: &str, record_bytes: &[u8]) -> Result<(), PruneError> {
        self.routed
            .entry(key.to_string())
            .or_default()
            .extend_from_slice(record_bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mseed_prune_core::codec::reference::ReferenceCodec;
    use mseed_prune_core::keys::{ChannelKey, TraceKey};
    use mseed_prune_core::quality::Quality;
    use mseed_prune_core::record::Record;
    use mseed_prune_core::settings::NoOpBudget;
    use mseed_prune_core::time::{Calendar, Time};
    use std::io::Write as _;

    fn build_record(samples: &[i32]) -> Vec<u8> {
        let cal = Calendar {
            year: 2020,
            day_of_year: 1,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
        };
        let mut out = Vec::new();
        out.extend(b"IU");
        out.extend(b"ANMO ");
        out.extend(b"00");
        out.extend(b"BHZ");
        out.push(b'D');
        out.extend((cal.year as i16).to_be_bytes());
        out.extend((cal.day_of_year as u16).to_be_bytes());
        out.push(cal.hour as u8);
        out.push(cal.minute as u8);
        out.push(cal.second as u8);
        out.push(0);
        out.extend(1.0f64.to_be_bytes());
        out.extend((samples.len() as u32).to_be_bytes());
        for s in samples {
            out.extend(s.to_be_bytes());
        }
        out
    }

    #[test]
    fn emits_a_single_untouched_record_verbatim() {
        let bytes = build_record(&[1, 2, 3, 4, 5]);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut group = TraceGroup::new();
        let f = group.add_file(&path);
        let key = TraceKey::new(ChannelKey::new("IU", "ANMO", "00", "BHZ"), 1.0, None);
        let tol = mseed_prune_core::settings::Tolerances::default();
        let record = Record::new(
            f,
            0,
            bytes.len(),
            Time::from_ticks(0),
            Time::from_ticks(4_000_000),
            Quality::DataCenter,
            1.0,
        );
        group.place(key, record, &tol);

        let codec = ReferenceCodec;
        let mut emitter = Emitter::new(&codec);
        let mut output = Vec::new();
        let mut budget = NoOpBudget;
        let report = emitter.emit(&mut group, &mut output, &mut budget).unwrap();

        assert_eq!(report.records_emitted, 1);
        assert_eq!(output, bytes);
    }

    #[test]
    fn dropped_record_is_not_emitted() {
        let bytes = build_record(&[1, 2, 3]);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut group = TraceGroup::new();
        let f = group.add_file(&path);
        let key = TraceKey::new(ChannelKey::new("IU", "ANMO", "00", "BHZ"), 1.0, None);
        let tol = mseed_prune_core::settings::Tolerances::default();
        let mut record = Record::new(
            f,
            0,
            bytes.len(),
            Time::from_ticks(0),
            Time::from_ticks(2_000_000),
            Quality::DataCenter,
            1.0,
        );
        record.drop_record();
        group.place(key, record, &tol);

        let codec = ReferenceCodec;
        let mut emitter = Emitter::new(&codec);
        let mut output = Vec::new();
        let mut budget = NoOpBudget;
        let report = emitter.emit(&mut group, &mut output, &mut budget).unwrap();

        assert_eq!(report.records_emitted, 0);
        assert_eq!(report.records_dropped, 1);
        assert!(output.is_empty());
    }

    #[test]
    fn trimmed_record_is_repacked_with_fewer_samples() {
        // §8 scenario 5 (window clipping), exercised at the emitter level:
        // 10 Hz, 100 samples spanning 10s; trim to [1s, 9s] leaves 81
        // samples (one every 0.1s from 1.0s through 9.0s inclusive).
        let samples: Vec<i32> = (0..100).collect();
        let bytes = build_record(&samples);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut group = TraceGroup::new();
        let f = group.add_file(&path);
        let key = TraceKey::new(ChannelKey::new("IU", "ANMO", "00", "BHZ"), 10.0, None);
        let tol = mseed_prune_core::settings::Tolerances::default();
        let mut record = Record::new(
            f,
            0,
            bytes.len(),
            Time::from_ticks(0),
            Time::from_ticks(9_900_000),
            Quality::DataCenter,
            10.0,
        );
        record.newstart = Some(Time::from_ticks(1_000_000));
        record.newend = Some(Time::from_ticks(9_000_000));
        group.place(key, record, &tol);

        let codec = ReferenceCodec;
        let mut emitter = Emitter::new(&codec);
        let mut output = Vec::new();
        let mut budget = NoOpBudget;
        let report = emitter.emit(&mut group, &mut output, &mut budget).unwrap();

        assert_eq!(report.records_emitted, 1);
        assert_eq!(report.records_trimmed, 1);
        let unpacked = codec.unpack(&output).unwrap();
        assert_eq!(unpacked, samples[10..91]);
    }

    #[test]
    fn replace_input_writes_in_place_and_no_backups_removes_orig() {
        let bytes = build_record(&[1, 2, 3]);
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut group = TraceGroup::new();
        let f = group.add_file(&path);
        let key = TraceKey::new(ChannelKey::new("IU", "ANMO", "00", "BHZ"), 1.0, None);
        let tol = mseed_prune_core::settings::Tolerances::default();
        let record = Record::new(
            f,
            0,
            bytes.len(),
            Time::from_ticks(0),
            Time::from_ticks(2_000_000),
            Quality::DataCenter,
            1.0,
        );
        group.place(key, record, &tol);

        let codec = ReferenceCodec;
        let mut emitter = Emitter::new(&codec);
        emitter.set_replace_input(true, true);
        let mut output = Vec::new();
        let mut budget = NoOpBudget;
        let report = emitter.emit(&mut group, &mut output, &mut budget).unwrap();

        assert_eq!(report.records_emitted, 1);
        assert!(output.is_empty(), "replace-input bytes go to the per-file writer, not the single sink");
        let rewritten = std::fs::read(&path).unwrap();
        assert_eq!(rewritten, bytes);
        assert!(!std::path::Path::new(&format!("{}.orig", path)).exists());
    }
}
