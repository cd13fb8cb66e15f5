//! The [`Codec`] trait: the boundary to the external Mini-SEED record codec
//! (§2.1, §6). THE CORE never parses record bytes itself; it asks a `Codec`
//! implementation to do so, and operates only on the [`RawRecord`]
//! descriptors and `unpack`/`pack` results that come back.
//!
//! Also home to the two other small external-collaborator traits named in
//! §2.1: [`Matcher`] (regex *application*, not compilation) and
//! [`ArchiveSink`] (the archive-layout output router).
use crate::errors::PruneError;
use crate::quality::Quality;

/// One record as reported by a [`Codec`] during iteration: everything
/// RecordIndex needs without looking at the bytes itself (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub byte_offset: u64,
    pub length: usize,
    pub start: crate::time::Time,
    pub end: crate::time::Time,
    pub quality: Quality,
    pub sample_rate: f64,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

/// The external Mini-SEED codec boundary. An implementation parses headers,
/// unpacks samples, and repacks records; THE CORE only ever calls through
/// this trait.
pub trait Codec {
    /// Iterate records in `data` (a whole file's bytes), in on-disk order.
    /// An error on one record stops iteration at that offset; already
    /// yielded records remain valid (§4.2 failure semantics).
    fn iter_records<'a>(
        &self,
        data: &'a [u8],
    ) -> Box<dyn Iterator<Item = Result<RawRecord, PruneError>> + 'a>;

    /// Unpack one record's samples as signed 32-bit integers.
    fn unpack(&self, record_bytes: &[u8]) -> Result<Vec<i32>, PruneError>;

    /// Repack `samples` into a record, reusing `template`'s header fields
    /// except for the start time, which is overridden to `new_start` when
    /// trimming removed leading samples.
    fn pack(
        &self,
        template: &RawRecord,
        samples: &[i32],
        new_start: crate::time::Time,
    ) -> Result<Vec<u8>, PruneError>;

    /// The sample period, in ticks, for a trace at `rate` Hz (§6).
    fn sample_period(&self, rate: f64) -> i64 {
        crate::time::sample_period(rate)
    }

    /// Whether two nominal sample rates should be treated as the same
    /// trace, within `tol` Hz.
    fn rate_tolerable(&self, a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// The byte offset of the quality indicator within one record, used by
    /// the Emitter's quality-restamp step (§4.6 step 3) without invoking
    /// the codec for a full repack.
    fn quality_byte_offset(&self) -> usize {
        6
    }
}

/// Regex *application* against a trace's match-string (§2.1: compilation --
/// building a `Regex` from a CLI flag or `@file` compound pattern -- is out
/// of scope; applying an already-built one is in-core).
pub trait Matcher {
    fn is_match(&self, key: &str) -> bool;
}

impl Matcher for regex::Regex {
    fn is_match(&self, key: &str) -> bool {
        regex::Regex::is_match(self, key)
    }
}

/// The archive-layout output router (§4.6 step 4, §6): an external
/// collaborator that expands a template path per record and writes bytes
/// there. THE CORE only depends on this trait.
pub trait ArchiveSink {
    fn route(&mut self, key: &str, record_bytes: &[u8]) -> Result<(), PruneError>;
}

/// A minimal, intentionally simplified Mini-SEED-shaped codec used to
/// exercise the pipeline end-to-end in tests (§2.1). Not a production
/// decoder: samples are plain big-endian `i32`s, not Steim-compressed,
/// which is the excluded codec's job.
pub mod reference {
    use super::*;
    use crate::time::{Calendar, Time};

    /// Fixed header layout used by [`ReferenceCodec`]:
    /// `[network:2][station:5][location:2][channel:3][quality:1]
    ///  [year:2 BE][day_of_year:2 BE][hour:1][minute:1][second:1][pad:1]
    ///  [sample_rate:8 BE f64][sample_count:4 BE u32]`, followed by
    /// `sample_count * 4` bytes of big-endian `i32` samples.
    pub const HEADER_LEN: usize = 2 + 5 + 2 + 3 + 1 + 2 + 2 + 1 + 1 + 1 + 1 + 8 + 4;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct ReferenceCodec;

    fn fixed_str(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).trim_end().to_string()
    }

    fn pad(s: &str, len: usize) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(len, b' ');
        v.truncate(len);
        v
    }

    impl Codec for ReferenceCodec {
        fn iter_records<'a>(
            &self,
            data: &'a [u8],
        ) -> Box<dyn Iterator<Item = Result<RawRecord, PruneError>> + 'a> {
            struct Iter<'a> {
                data: &'a [u8],
                offset: u64,
            }
            impl<'a> Iterator for Iter<'a> {
                type Item = Result<RawRecord, PruneError>;
                fn next(&mut self) -> Option<Self::Item> {
                    let off = self.offset as usize;
                    if off >= self.data.len() {
                        return None;
                    }
                    if off + HEADER_LEN > self.data.len() {
                        return Some(Err(PruneError::FileTooShort {
                            path: String::new(),
                        }));
                    }
                    let h = &self.data[off..off + HEADER_LEN];
                    let network = fixed_str(&h[0..2]);
                    let station = fixed_str(&h[2..7]);
                    let location = fixed_str(&h[7..9]);
                    let channel = fixed_str(&h[9..12]);
                    let quality = match Quality::from_byte(h[12]) {
                        Ok(q) => q,
                        Err(e) => return Some(Err(e)),
                    };
                    let year = i16::from_be_bytes([h[13], h[14]]) as i32;
                    let day_of_year = u16::from_be_bytes([h[15], h[16]]) as u32;
                    let hour = h[17] as u32;
                    let minute = h[18] as u32;
                    let second = h[19] as u32;
                    let sample_rate =
                        f64::from_be_bytes(h[21..29].try_into().expect("8 bytes"));
                    let sample_count =
                        u32::from_be_bytes(h[29..33].try_into().expect("4 bytes")) as usize;

                    let start = Calendar {
                        year,
                        day_of_year,
                        hour,
                        minute,
                        second,
                        micros: 0,
                    }
                    .to_time();
                    let period = crate::time::sample_period(sample_rate);
                    let end = if sample_count > 0 {
                        start.add(period * (sample_count as i64 - 1))
                    } else {
                        start
                    };

                    let total_len = HEADER_LEN + sample_count * 4;
                    if off + total_len > self.data.len() {
                        return Some(Err(PruneError::FileTooShort {
                            path: String::new(),
                        }));
                    }

                    let rec = RawRecord {
                        byte_offset: self.offset,
                        length: total_len,
                        start,
                        end,
                        quality,
                        sample_rate,
                        network,
                        station,
                        location,
                        channel,
                    };
                    self.offset += total_len as u64;
                    Some(Ok(rec))
                }
            }
            Box::new(Iter { data, offset: 0 })
        }

        fn unpack(&self, record_bytes: &[u8]) -> Result<Vec<i32>, PruneError> {
            if record_bytes.len() < HEADER_LEN {
                return Err(PruneError::FileTooShort {
                    path: String::new(),
                });
            }
            let sample_count =
                u32::from_be_bytes(record_bytes[29..33].try_into().expect("4 bytes")) as usize;
            let body = &record_bytes[HEADER_LEN..];
            if body.len() < sample_count * 4 {
                return Err(PruneError::CodecIndexError {
                    offset: 0,
                    msg: "sample body shorter than declared sample count".to_string(),
                });
            }
            Ok(body
                .chunks_exact(4)
                .take(sample_count)
                .map(|c| i32::from_be_bytes(c.try_into().expect("4 bytes")))
                .collect())
        }

        fn pack(
            &self,
            template: &RawRecord,
            samples: &[i32],
            new_start: Time,
        ) -> Result<Vec<u8>, PruneError> {
            let cal = Calendar::from_time(new_start);
            let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * 4);
            out.extend(pad(&template.network, 2));
            out.extend(pad(&template.station, 5));
            out.extend(pad(&template.location, 2));
            out.extend(pad(&template.channel, 3));
            out.push(template.quality.to_byte());
            out.extend((cal.year as i16).to_be_bytes());
            out.extend((cal.day_of_year as u16).to_be_bytes());
            out.push(cal.hour as u8);
            out.push(cal.minute as u8);
            out.push(cal.second as u8);
            out.push(0); // pad
            out.extend(template.sample_rate.to_be_bytes());
            out.extend((samples.len() as u32).to_be_bytes());
            for s in samples {
                out.extend(s.to_be_bytes());
            }
            Ok(out)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn build_record(
            net: &str,
            sta: &str,
            loc: &str,
            chan: &str,
            quality: u8,
            cal: Calendar,
            rate: f64,
            samples: &[i32],
        ) -> Vec<u8> {
            let mut out = Vec::new();
            out.extend(pad(net, 2));
            out.extend(pad(sta, 5));
            out.extend(pad(loc, 2));
            out.extend(pad(chan, 3));
            out.push(quality);
            out.extend((cal.year as i16).to_be_bytes());
            out.extend((cal.day_of_year as u16).to_be_bytes());
            out.push(cal.hour as u8);
            out.push(cal.minute as u8);
            out.push(cal.second as u8);
            out.push(0);
            out.extend(rate.to_be_bytes());
            out.extend((samples.len() as u32).to_be_bytes());
            for s in samples {
                out.extend(s.to_be_bytes());
            }
            out
        }

        #[test]
        fn roundtrip_iterates_one_record() {
            let cal = Calendar {
                year: 2007,
                day_of_year: 1,
                hour: 0,
                minute: 0,
                second: 0,
                micros: 0,
            };
            let samples = [1, 2, 3, 4, 5];
            let data = build_record("IU", "ANMO", "00", "BHZ", b'D', cal, 1.0, &samples);
            let codec = ReferenceCodec;
            let recs: Vec<_> = codec.iter_records(&data).collect::<Result<_, _>>().unwrap();
            assert_eq!(recs.len(), 1);
            assert_eq!(recs[0].station, "ANMO");
            assert_eq!(recs[0].quality, Quality::DataCenter);

            let unpacked = codec.unpack(&data).unwrap();
            assert_eq!(unpacked, samples);
        }

        #[test]
        fn two_records_back_to_back() {
            let cal = Calendar {
                year: 2007,
                day_of_year: 1,
                hour: 0,
                minute: 0,
                second: 0,
                micros: 0,
            };
            let mut data = build_record("IU", "ANMO", "00", "BHZ", b'D', cal, 1.0, &[1, 2]);
            data.extend(build_record("IU", "ANMO", "00", "BHZ", b'D', cal, 1.0, &[3, 4]));
            let codec = ReferenceCodec;
            let recs: Vec<_> = codec.iter_records(&data).collect::<Result<_, _>>().unwrap();
            assert_eq!(recs.len(), 2);
            assert_eq!(recs[1].byte_offset, recs[0].length as u64);
        }
    }
}
