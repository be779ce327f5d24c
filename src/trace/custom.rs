//! Custom (recorder_viz-derived) trace format: one whitespace-separated line
//! per request, `<path> <rank> <tstart> <tend> <offset> <count> <isRead>
//! <segments>`. Size isn't recorded directly; it's read off `count` (bytes
//! transferred) when present, falling back to a fixed default.
//!
//! No predicted-lifetime model is computed for this format — unlike the SNIA
//! and object-store traces, it carries no "unique id first/last seen" signal
//! cheap enough to derive one from (`path` repeats across ranks).

use std::fs;

use colored::Colorize;

use crate::error::{SimError, TraceError};

use super::{Op, Trace, TraceRecord};

const DEFAULT_SIZE_HINT: u64 = 4096;

pub struct CustomTrace {
    records: Vec<TraceRecord>,
}

/// §7 `TraceFormatError`: reported with a line number and dropped, the run
/// continues — never fatal, unlike a timestamp regression or unknown path.
fn warn_dropped(err: TraceError) {
    eprintln!("{}", format!("{err}").yellow());
}

impl CustomTrace {
    pub fn load(path: &str) -> Result<Self, SimError> {
        let contents = fs::read_to_string(path)?;
        let mut records = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 7 {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: "expected at least 7 whitespace-separated fields".to_string(),
                });
                continue;
            }
            let file_path = fields[0].to_string();
            let tstart: f64 = match fields[2].parse() {
                Ok(v) => v,
                Err(_) => {
                    warn_dropped(TraceError::Format {
                        path: path.to_string(),
                        line: line_no + 1,
                        reason: format!("bad tstart \"{}\"", fields[2]),
                    });
                    continue;
                }
            };
            let count: u64 = fields[5].parse().unwrap_or(DEFAULT_SIZE_HINT);
            let is_read = fields[6] == "1" || fields[6].eq_ignore_ascii_case("true");

            let op = if seen.insert(file_path.clone()) {
                Op::CreateOrAccess
            } else if is_read {
                Op::Get
            } else {
                Op::Put
            };

            records.push(TraceRecord {
                timestamp: tstart,
                op,
                path: file_path,
                size_hint: count,
            });
        }

        Ok(CustomTrace { records })
    }
}

impl Trace for CustomTrace {
    fn records(&self) -> &[TraceRecord] {
        &self.records
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
    fn first_occurrence_of_a_path_is_a_create() {
        let f = write_trace("/a 0 0.0 1.0 0 4096 1 1\n");
        let trace = CustomTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records().len(), 1);
        assert_eq!(trace.records()[0].op, Op::CreateOrAccess);
        assert_eq!(trace.records()[0].path, "/a");
    }

    #[test]
    fn repeat_occurrence_is_a_read_or_write_by_the_isread_field() {
        let f = write_trace(
            "/a 0 0.0 1.0 0 4096 1 1\n\
             /a 0 1.0 2.0 0 4096 1 1\n\
             /a 0 2.0 3.0 0 4096 0 1\n",
        );
        let trace = CustomTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records()[1].op, Op::Get);
        assert_eq!(trace.records()[2].op, Op::Put);
    }

    #[test]
    fn malformed_lines_are_dropped_not_fatal() {
        let f = write_trace("too short\n/a 0 0.0 1.0 0 4096 1 1\n");
        let trace = CustomTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records().len(), 1);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let f = write_trace("\n/a 0 0.0 1.0 0 4096 1 1\n\n");
        let trace = CustomTrace::load(f.path().to_str().unwrap()).unwrap();
        assert_eq!(trace.records().len(), 1);
    }
}
