//! Object-store trace format: one whitespace-separated line per request,
//! `<timestamp> <op>.<verb> <uid> <size> <offset_start> <offset_end>`, `op`
//! one of `PUT`/`GET`/`HEAD`/`DELETE`. A `uid` referenced before any `PUT` is
//! synthesised as an implicit `PUT` the first time it's seen, mirroring the
//! original bootstrap that back-fills missing creations.

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

pub struct ObjectStoreTrace {
    records: Vec<TraceRecord>,
    lifetime_model: LifetimeModel,
}

impl ObjectStoreTrace {
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
            if fields.len() < 4 {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: "expected at least 4 whitespace-separated fields".to_string(),
                });
                continue;
            }
            let Ok(timestamp) = fields[0].parse::<f64>() else {
                warn_dropped(TraceError::Format {
                    path: path.to_string(),
                    line: line_no + 1,
                    reason: format!("bad timestamp \"{}\"", fields[0]),
                });
                continue;
            };
            let verb = fields[1].split('.').next_back().unwrap_or(fields[1]);
            let uid = fields[2].to_string();
            let size: u64 = fields.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);

            if !seen.contains(&uid) && verb != "PUT" {
                records.push(TraceRecord {
                    timestamp,
                    op: Op::Put,
                    path: uid.clone(),
                    size_hint: size,
                });
            }
            seen.insert(uid.clone());

            let entry = occurrences.entry(uid.clone()).or_insert((timestamp, timestamp, 0));
            entry.1 = timestamp;
            entry.2 += 1;

            let op = match verb {
                "PUT" => Op::Put,
                "GET" => Op::Get,
                "HEAD" => Op::Head,
                "DELETE" => Op::Delete,
                other => {
                    warn_dropped(TraceError::Format {
                        path: path.to_string(),
                        line: line_no + 1,
                        reason: format!("unknown operation code \"{other}\""),
                    });
                    continue;
                }
            };
            records.push(TraceRecord {
                timestamp,
                op,
                path: uid,
                size_hint: size,
            });
        }

        let lifetime_model = lifetimes_from_occurrences(&occurrences);
        Ok(ObjectStoreTrace {
            records,
            lifetime_model,
        })
    }
}

impl Trace for ObjectStoreTrace {
    fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    fn lifetime_model(&self) -> Option<LifetimeModel> {
        Some(self.lifetime_model.clone())
    }
}
