//! The Splitter (§4.5): clones a record descriptor across calendar
//! boundaries, assigning `newstart`/`newend` rather than touching bytes.
use crate::file::File;
use crate::record::Record;
use crate::time::{sample_period, Calendar, SplitUnit};

/// Split `record` at every `split_unit` boundary it straddles, returning
/// the resulting chain in time order (a single-element chain if no split
/// unit is configured or the record fits within one boundary). `file`
/// receives one `split` increment per boundary crossed.
pub fn split_record(record: Record, split_unit: SplitUnit, file: &mut File) -> Vec<Record> {
    if split_unit == SplitUnit::None {
        return vec![record];
    }
    let period = sample_period(record.sample_rate);
    let mut chain = Vec::new();
    let mut current = record;
    loop {
        let eff_start = current.eff_start();
        let cal = Calendar::from_time(eff_start);
        let boundary = match cal.next_boundary(split_unit) {
            Some(b) => b.to_time(),
            None => {
                chain.push(current);
                return chain;
            }
        };
        if current.end <= boundary {
            chain.push(current);
            return chain;
        }
        let mut clone = current;
        current.newend = Some(boundary.sub_ticks(period));
        clone.newstart = Some(boundary);
        chain.push(current);
        file.record_split();
        current = clone;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Quality;
    use crate::time::{Calendar, Time};

    #[test]
    fn day_boundary_split_produces_two_records() {
        let start = Calendar {
            year: 2007,
            day_of_year: 1,
            hour: 23,
            minute: 59,
            second: 58,
            micros: 0,
        }
        .to_time();
        let end = Calendar {
            year: 2007,
            day_of_year: 2,
            hour: 0,
            minute: 0,
            second: 2,
            micros: 0,
        }
        .to_time();
        let record = Record::new(0, 0, 512, start, end, Quality::DataCenter, 1.0);
        let mut file = File::new("a.mseed");
        let chain = split_record(record, SplitUnit::Day, &mut file);
        assert_eq!(chain.len(), 2);
        let boundary = Calendar {
            year: 2007,
            day_of_year: 2,
            hour: 0,
            minute: 0,
            second: 0,
            micros: 0,
        }
        .to_time();
        assert_eq!(chain[0].newend, Some(boundary.sub_ticks(1_000_000)));
        assert_eq!(chain[1].newstart, Some(boundary));
        assert_eq!(chain[1].end, end);
        assert_eq!(file.split, 1);
    }

    #[test]
    fn no_split_unit_returns_single_record() {
        let record = Record::new(
            0,
            0,
            512,
            Time::from_ticks(0),
            Time::from_ticks(100),
            Quality::DataCenter,
            1.0,
        );
        let mut file = File::new("a.mseed");
        let chain = split_record(record, SplitUnit::None, &mut file);
        assert_eq!(chain.len(), 1);
        assert_eq!(file.split, 0);
    }

    #[test]
    fn record_within_one_boundary_is_unsplit() {
        let start = Calendar {
            year: 2007,
            day_of_year: 1,
            hour: 1,
            minute: 0,
            second: 0,
            micros: 0,
        }
        .to_time();
        let end = Calendar {
            year: 2007,
            day_of_year: 1,
            hour: 2,
            minute: 0,
            second: 0,
            micros: 0,
        }
        .to_time();
        let record = Record::new(0, 0, 512, start, end, Quality::DataCenter, 1.0);
        let mut file = File::new("a.mseed");
        let chain = split_record(record, SplitUnit::Day, &mut file);
        assert_eq!(chain.len(), 1);
    }
}
