//! The Pruner (§4.4): cross-trace overlap resolution by quality+length
//! priority, with optional sample-level trim of the loser's boundary.
use mseed_prune_core::quality::qcompare;
use mseed_prune_core::record::Record;
use mseed_prune_core::settings::{PruneMode, Tolerances};
use mseed_prune_core::time::Time;
use mseed_prune_core::tracegroup::TraceGroup;

/// A contiguous coverage interval inside a higher-priority trace's
/// `RecordMap`, used only within one pruning comparison (§3).
#[derive(Debug, Clone, Copy)]
struct TimeSegment {
    start: Time,
    end: Time,
}

/// Build the coverage segments of `records` (assumed already time-ordered),
/// merging adjacent/overlapping effective windows within `timetol` of one
/// sample period (§4.4 step 4).
fn build_segments(records: &[&Record], period: i64, timetol: i64) -> Vec<TimeSegment> {
    let mut segments: Vec<TimeSegment> = Vec::new();
    for r in records {
        if r.is_dropped() {
            continue;
        }
        let (e1, e2) = (r.eff_start(), r.eff_end());
        match segments.last_mut() {
            Some(seg) if (seg.end.add(period).sub(e1)).abs() <= timetol => {
                if e2 > seg.end {
                    seg.end = e2;
                }
            }
            _ => segments.push(TimeSegment { start: e1, end: e2 }),
        }
    }
    segments
}

fn fully_covered(e1: Time, e2: Time, seg: &TimeSegment) -> bool {
    e1 >= seg.start && e2 <= seg.end
}

/// Priority comparison for an (A, B) pair: `true` if A outranks B (§4.4
/// step 3). Ties (equal quality and equal bounding-interval length) favor A.
fn a_outranks_b(
    a_quality: mseed_prune_core::quality::Quality,
    a_len: i64,
    b_quality: mseed_prune_core::quality::Quality,
    b_len: i64,
    best_quality: bool,
) -> bool {
    if best_quality {
        match qcompare(a_quality, b_quality) {
            c if c != 0 => return c < 0,
            _ => {}
        }
    }
    a_len >= b_len
}

/// Run the Pruner over an already-sorted [`TraceGroup`] (§4.3, §4.4).
/// `best_quality` selects whether quality outranks length (equal-qualities
/// mode, `-E`, passes `false`).
pub fn prune(group: &mut TraceGroup, mode: PruneMode, tol: &Tolerances, best_quality: bool) {
    if mode == PruneMode::None {
        return;
    }
    let n = group.trace_count();
    for a_idx in 0..n {
        for b_idx in (a_idx + 1)..n {
            prune_pair(group, a_idx, b_idx, mode, tol, best_quality);
        }
    }
}

fn prune_pair(
    group: &mut TraceGroup,
    a_idx: usize,
    b_idx: usize,
    mode: PruneMode,
    tol: &Tolerances,
    best_quality: bool,
) {
    let (a_key, a_start, a_end, a_quality, a_len) = {
        let a = &group.traces()[a_idx];
        (
            a.key.clone(),
            a.start,
            a.end,
            dominant_quality(a),
            a.bounding_interval_length(),
        )
    };
    let (b_key, b_start, b_end, b_quality, b_len) = {
        let b = &group.traces()[b_idx];
        (
            b.key.clone(),
            b.start,
            b.end,
            dominant_quality(b),
            b.bounding_interval_length(),
        )
    };

    // §4.4 step 1: same ChannelKey and rates within tolerance -- quality is
    // deliberately NOT compared here, since resolving overlaps between
    // differently-qualified copies of one channel is the Pruner's whole job.
    if a_key.channel != b_key.channel || (a_key.sample_rate - b_key.sample_rate).abs() > tol.sample_rate_tol {
        return;
    }
    // §4.4 step 2.
    if !(a_end > b_start && a_start < b_end) {
        return;
    }

    // §4.4 step 3: A precedes B in group order, so ties favor A.
    let (hp_idx, lp_idx) = if a_outranks_b(a_quality, a_len, b_quality, b_len, best_quality) {
        (a_idx, b_idx)
    } else {
        (b_idx, a_idx)
    };

    let period = tol.sample_period(a_key.sample_rate);
    let timetol = tol.time_tol_for_rate(a_key.sample_rate);

    let hp_records: Vec<Record> = group.traces()[hp_idx].map.iter().copied().collect();
    let refs: Vec<&Record> = hp_records.iter().collect();
    let segments = build_segments(&refs, period, timetol);

    let hp_start = group.traces()[hp_idx].start;
    let hp_end = group.traces()[hp_idx].end;

    // Decide actions against an immutable read first; a trace's RecordMap
    // and the file arena are disjoint fields of TraceGroup, but the mutable
    // iterator below would otherwise overlap with the file-counter updates.
    enum Action {
        Drop,
        TrimEnd(Time),
        TrimStart(Time),
    }
    let mut actions: Vec<(usize, Action)> = Vec::new();
    for (i, lp) in group.traces()[lp_idx].map.iter().enumerate() {
        if lp.is_dropped() {
            continue;
        }
        let (e1, e2) = (lp.eff_start(), lp.eff_end());

        let covered = segments.iter().any(|seg| fully_covered(e1, e2, seg));
        if covered {
            actions.push((i, Action::Drop));
            continue;
        }

        if mode == PruneMode::Sample {
            if e1 <= hp_start && e2 >= hp_start {
                actions.push((i, Action::TrimEnd(hp_start.sub_ticks(period))));
            }
            if e1 <= hp_end && e2 >= hp_end {
                actions.push((i, Action::TrimStart(hp_end.add(period))));
            }
        }
    }

    let mut file_events: Vec<(usize, bool)> = Vec::new(); // (file_ref, is_removed)
    {
        let mut lp_records: Vec<&mut Record> = group.trace_mut(lp_idx).map.iter_mut().collect();
        for (i, action) in actions {
            let rec = &mut lp_records[i];
            match action {
                Action::Drop => {
                    rec.drop_record();
                    file_events.push((rec.file_ref, true));
                }
                Action::TrimEnd(t) => {
                    rec.newend = Some(t);
                    file_events.push((rec.file_ref, false));
                }
                Action::TrimStart(t) => {
                    rec.newstart = Some(t);
                    file_events.push((rec.file_ref, false));
                }
            }
        }
    }
    for (file_ref, is_removed) in file_events {
        let file = group.file_mut(file_ref);
        if is_removed {
            file.record_removed();
        } else {
            file.record_trimmed();
        }
    }
}

fn dominant_quality(trace: &mseed_prune_core::record::Trace) -> mseed_prune_core::quality::Quality {
    trace
        .map
        .iter()
        .filter(|r| !r.is_dropped())
        .map(|r| r.quality)
        .max()
        .unwrap_or(mseed_prune_core::quality::Quality::Raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mseed_prune_core::keys::{ChannelKey, TraceKey};
    use mseed_prune_core::quality::Quality;

    fn key(quality: Option<Quality>) -> TraceKey {
        TraceKey::new(ChannelKey::new("IU", "ANMO", "00", "BHZ"), 1.0, quality)
    }

    fn rec(file: usize, start: i64, end: i64, q: Quality) -> Record {
        Record::new(file, 0, 512, Time::from_ticks(start), Time::from_ticks(end), q, 1.0)
    }

    #[test]
    fn record_level_prune_drops_lower_quality_on_full_overlap() {
        let mut group = TraceGroup::new();
        let fa = group.add_file("a");
        let fb = group.add_file("b");
        let tol = Tolerances::default();
        group.place(key(Some(Quality::DataCenter)), rec(fa, 0, 100, Quality::DataCenter), &tol);
        group.place(key(Some(Quality::Raw)), rec(fb, 0, 100, Quality::Raw), &tol);
        group.sort_for_pruning();

        prune(&mut group, PruneMode::Record, &tol, true);

        let dropped: Vec<bool> = group
            .traces()
            .iter()
            .flat_map(|t| t.map.iter().map(|r| r.is_dropped()))
            .collect();
        assert_eq!(dropped.iter().filter(|d| **d).count(), 1);
    }

    #[test]
    fn sample_level_trim_clips_overlap_head() {
        let mut group = TraceGroup::new();
        let fa = group.add_file("a");
        let fb = group.add_file("b");
        let tol = Tolerances::default();
        group.place(
            key(Some(Quality::DataCenter)),
            rec(fa, 10_000_000, 20_000_000, Quality::DataCenter),
            &tol,
        );
        group.place(
            key(Some(Quality::Raw)),
            rec(fb, 18_000_000, 25_000_000, Quality::Raw),
            &tol,
        );
        group.sort_for_pruning();

        prune(&mut group, PruneMode::Sample, &tol, true);

        let lp = group
            .traces()
            .iter()
            .find(|t| t.map.iter().any(|r| r.quality == Quality::Raw))
            .unwrap();
        let r = lp.map.iter().next().unwrap();
        assert_eq!(r.newstart, Some(Time::from_ticks(21_000_000)));
    }
}
