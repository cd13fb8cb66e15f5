//! Record indexing: scans files via a [`Codec`](mseed_prune_core::codec::Codec),
//! applies the [`Selector`], and places each record into a
//! [`TraceGroup`](mseed_prune_core::TraceGroup), splitting on calendar
//! boundaries along the way (§4.2).
extern crate memmap2;
extern crate regex;

pub mod scan;
pub mod selector;

pub use scan::MappedFile;
pub use selector::Selector;

use mseed_prune_core::codec::Codec;
use mseed_prune_core::keys::{ChannelKey, TraceKey};
use mseed_prune_core::record::Record;
use mseed_prune_core::settings::{Context, PruneMode};
use mseed_prune_core::splitter::split_record;
use mseed_prune_core::tracegroup::TraceGroup;

/// Outcome of indexing one file: partial success is the norm (§7) -- a
/// codec error stops iteration of that file but does not fail the run.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub file_path: String,
    pub records_indexed: usize,
    pub records_filtered: usize,
    pub error: Option<String>,
}

/// The key string regexes are matched against: `NET_STA_LOC_CHAN_QUAL`.
fn match_string(network: &str, station: &str, location: &str, channel: &str, quality: char) -> String {
    format!("{}_{}_{}_{}_{}", network, station, location, channel, quality)
}

pub struct RecordIndex<'c, C: Codec> {
    codec: &'c C,
    selector: Selector,
}

impl<'c, C: Codec> RecordIndex<'c, C> {
    pub fn new(codec: &'c C, selector: Selector) -> Self {
        RecordIndex { codec, selector }
    }

    /// Index one file's records into `group`, honoring `ctx`'s window,
    /// prune mode, and split unit (§4.2).
    pub fn index_file(&self, path: &str, group: &mut TraceGroup, ctx: &Context) -> IndexReport {
        let mapped = match MappedFile::open(path) {
            Ok(m) => m,
            Err(e) => {
                log::error!("could not open {}: {}", path, e);
                return IndexReport {
                    file_path: path.to_string(),
                    records_indexed: 0,
                    records_filtered: 0,
                    error: Some(e.to_string()),
                };
            }
        };
        let file_ref = group.add_file(path);

        let mut indexed = 0;
        let mut filtered = 0;
        let mut error = None;

        for result in mapped.scan(self.codec) {
            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    log::error!("codec error indexing {}: {}", path, e);
                    error = Some(e.to_string());
                    break;
                }
            };

            if selector::window_drops(ctx, raw.start, raw.end) {
                filtered += 1;
                continue;
            }

            let key_str = match_string(
                &raw.network,
                &raw.station,
                &raw.location,
                &raw.channel,
                raw.quality.to_byte() as char,
            );
            if !self.selector.allows_key(&key_str) {
                filtered += 1;
                continue;
            }

            let trace_quality = if ctx.quality_sensitive {
                Some(raw.quality)
            } else {
                None
            };
            let channel_key = ChannelKey::new(
                raw.network.clone(),
                raw.station.clone(),
                raw.location.clone(),
                raw.channel.clone(),
            );
            let trace_key = TraceKey::new(channel_key, raw.sample_rate, trace_quality);

            let mut record = Record::new(
                file_ref,
                raw.byte_offset,
                raw.length,
                raw.start,
                raw.end,
                raw.quality,
                raw.sample_rate,
            );

            // §4.2 step 7: unconditional sample-window trim assignment
            // (the guarded form in the original is unreachable here, see
            // SPEC_FULL.md §9).
            if ctx.prune_mode == PruneMode::Sample {
                if let Some(ws) = ctx.window_start {
                    if record.start < ws {
                        record.newstart = Some(ws);
                    }
                }
                if let Some(we) = ctx.window_end {
                    if record.end > we {
                        record.newend = Some(we);
                    }
                }
            }

            // Decide placement using the unsplit record, then split, then
            // splice the whole chain atomically (§4.2 step 8, §9).
            let (idx, whence) = group.locate_or_create(trace_key, &record, &ctx.tolerances);
            let mut file = group.file(file_ref).clone();
            let chain = split_record(record, ctx.split_unit, &mut file);
            *group.file_mut(file_ref) = file;
            group.splice_chain(idx, chain, whence);

            indexed += 1;
        }

        IndexReport {
            file_path: path.to_string(),
            records_indexed: indexed,
            records_filtered: filtered,
            error,
        }
    }
}

/// Index many files in order into one fresh [`TraceGroup`], then sort it
/// for pruning (§4.3). Returns one [`IndexReport`] per file.
pub fn index_files<C: Codec>(
    paths: &[String],
    codec: &C,
    selector: Selector,
    ctx: &Context,
) -> (TraceGroup, Vec<IndexReport>) {
    let indexer = RecordIndex::new(codec, selector);
    let mut group = TraceGroup::new();
    let reports = paths
        .iter()
        .map(|p| indexer.index_file(p, &mut group, ctx))
        .collect();
    group.sort_for_pruning();
    (group, reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mseed_prune_core::codec::reference::ReferenceCodec;
    use mseed_prune_core::time::Calendar;
    use std::io::Write;

    fn build_record(station: &str, cal: Calendar, samples: &[i32]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(b"IU");
        let mut sta = station.as_bytes().to_vec();
        sta.resize(5, b' ');
        out.extend(sta);
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
    fn indexes_one_file_into_one_trace() {
        let cal = Calendar {
            year: 2020,
            day_of_year: 5,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
        };
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&build_record("ANMO", cal, &[1, 2, 3, 4, 5]))
            .unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let codec = ReferenceCodec;
        let ctx = Context::default();
        let (group, reports) = index_files(&[path], &codec, Selector::new(), &ctx);
        assert_eq!(reports[0].records_indexed, 1);
        assert_eq!(group.trace_count(), 1);
        assert_eq!(group.traces()[0].map.len(), 1);
    }

    #[test]
    fn match_regex_filters_out_record() {
        let cal = Calendar {
            year: 2020,
            day_of_year: 5,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
        };
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&build_record("ANMO", cal, &[1, 2, 3]))
            .unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let codec = ReferenceCodec;
        let ctx = Context::default();
        let re = regex::Regex::new("NONEXISTENT").unwrap();
        let selector = Selector::new().with_match(Box::new(re));
        let (group, reports) = index_files(&[path], &codec, selector, &ctx);
        assert_eq!(reports[0].records_filtered, 1);
        assert_eq!(group.trace_count(), 0);
    }
}
