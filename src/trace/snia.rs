//! SNIA-style trace format: `<YYYYMMDDHHMMSS> <file_id> <rank> <size_class>
//! <return_size> ...`, whitespace-separated. `size_class` is a single
//! character mapped through a fixed size table (approximating the real file
//! size, since the original traces don't carry exact byte counts).

use std::collections::HashMap;
use std::fs;

use colored::Colorize;

use crate::error::{SimError, TraceError};
use crate::policy::LifetimeModel;

use super::{lifetimes_from_occurrences, Op, Trace, TraceRecord};

/// §7 `TraceFormatError`: reported with a line number and dropped, the run
/// continues — never fatal, unlike a timestamp regression or unknown path.
fn warn_dropped(err: TraceError) {
    eprintln!("{}", format!("{err}").yellow());
}

const CHAR_TO_SIZE: &[(char, u64)] = &[
    ('l', 33136),
    ('a', 3263749),
    ('o', 4925317),
    ('m', 6043467),
    ('c', 6050183),
    ('b', 8387821),
];

fn size_for_class(class: char) -> Option<u64> {
    CHAR_TO_SIZE.iter().find(|(c, _)| *c == class).map(|(_, s)| *s)
}

/// Days since 1970-01-01 for a proleptic-Gregorian civil date, Howard
/// Hinnant's `days_from_civil` algorithm — avoids pulling in a calendar
/// crate just to parse a fixed `YYYYMMDDHHMMSS` timestamp.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn parse_timestamp(raw: &str) -> Option<f64> {
    if raw.len() != 14 {
        return None;
    }
    let year: i64 = raw[0..4].parse().ok()?;
    let month: i64 = raw[4..6].parse().ok()?;
    let day: i64 = raw[6..8].parse().ok()?;
    let hour: i64 = raw[8..10].parse().ok()?;
    let minute: i64 = raw[10..12].parse().ok()?;
    let second: i64 = raw[12..14].parse().ok()?;
    let days = days_from_civil(year, month, day);
    Some((days * 86400 + hour * 3600 + minute * 60 + second) as f64)
}

pub struct SniaTrace {
    records: Vec<TraceRecord>,
    lifetime_model: LifetimeModel,
}

impl SniaTrace {
    pub fn load(path: &str) -> Result<Self, SimError> {
        let contents = fs::read_to_string(path)?;
        let mut records = Vec::new();
        let mut occurrences: HashMap<String, (f64, f64, u64)> = HashMap::new();
        let mut seen = std::collections::HashSet::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: "expected at least 5 whitespace-separated fields".to_string(),
                });
                continue;
            }
            let Some(timestamp) = parse_timestamp(fields[0]) else {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: format!("bad timestamp \"{}\"", fields[0]),
                });
                continue;
            };
            let file_id = fields[1].to_string();
            let Some(size_class) = fields[3].chars().next() else {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: "empty size class field".to_string(),
                });
                continue;
            };
            let Some(size) = size_for_class(size_class) else {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: format!("unknown size class \"{size_class}\""),
                });
                continue;
            };

            let op = if seen.insert(file_id.clone()) {
                Op::CreateOrAccess
            } else {
                Op::Get
            };

            let entry = occurrences
                .entry(file_id.clone())
                .or_insert((timestamp, timestamp, 0));
            entry.1 = timestamp;
            entry.2 += 1;

            records.push(TraceRecord {
                timestamp,
                op,
                path: file_id,
                size_hint: size,
            });
        }

        let lifetime_model = lifetimes_from_occurrences(&occurrences);
        Ok(SniaTrace {
            records,
            lifetime_model,
        })
    }
}

impl Trace for SniaTrace {
    fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    fn lifetime_model(&self) -> Option<LifetimeModel> {
        Some(self.lifetime_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_trace(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_timestamp_and_size_class() {
        let f = write_trace("20200101000000 f1 0 a 0\n");
        let trace = SniaTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records().len(), 1);
        assert_eq!(trace.records()[0].size_hint, size_for_class('a').unwrap());
        assert_eq!(trace.records()[0].op, Op::CreateOrAccess);
    }

    #[test]
    fn repeat_ids_become_gets_and_feed_the_lifetime_model() {
        let f = write_trace(
            "20200101000000 f1 0 a 0\n\
             20200101000010 f1 0 a 0\n",
        );
        let trace = SniaTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records()[1].op, Op::Get);
        let model = trace.lifetime_model().unwrap();
        assert_eq!(*model.get("f1").unwrap(), 10.0);
    }

    #[test]
    fn single_occurrence_has_zero_predicted_lifetime() {
        let f = write_trace("20200101000000 f1 0 a 0\n");
        let trace = SniaTrace::load(f.path().to_str().unwrap()).unwrap();
        let model = trace.lifetime_model().unwrap();
        assert_eq!(*model.get("f1").unwrap(), 0.0);
    }

    #[test]
    fn unknown_size_class_is_dropped_not_fatal() {
        let f = write_trace("20200101000000 f1 0 z 0\n20200101000001 f2 0 a 0\n");
        let trace = SniaTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records().len(), 1);
        assert_eq!(trace.records()[0].path, "f2");
    }

    #[test]
    fn civil_date_conversion_matches_known_epoch_offsets() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1970, 1, 2), 1);
        assert_eq!(days_from_civil(2000, 3, 1), days_from_civil(2000, 2, 29) + 1);
    }
}
