//! The simulation driver (§4.1): walks a trace in timestamp order, advances
//! the clock, and turns each record into the right Tier/StorageManager call.
//!
//! Every original format nominally owns a `read_line` method, but once
//! parsed into [`crate::trace::TraceRecord`] they all reduce to the same five
//! opcodes, so there's a single dispatch here instead of one per format —
//! see `DESIGN.md` for why that collapse is safe.

use indicatif::ProgressBar;

use crate::clock::{Clock, SimTime};
use crate::error::SimError;
use crate::report;
use crate::storage::StorageManager;
use crate::tier::Cause;
use crate::trace::{Op, Trace};

pub struct Simulation {
    storage: StorageManager,
    clock: Clock,
    trace: Box<dyn Trace>,
    /// Non-strict: an access to a path with no prior create is back-filled
    /// with an implicit default-tier create. Strict: it's a fatal error.
    strict_trace: bool,
    /// If set, a read of a file not already on the default tier first
    /// migrates it there (modelling an oracle prefetcher) before the read.
    simulate_perfect_prefetch: bool,
}

impl Simulation {
    pub fn new(
        storage: StorageManager,
        trace: Box<dyn Trace>,
        strict_trace: bool,
        simulate_perfect_prefetch: bool,
    ) -> Self {
        Simulation {
            storage,
            clock: Clock::new(),
            trace,
            strict_trace,
            simulate_perfect_prefetch,
        }
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn into_storage(self) -> StorageManager {
        self.storage
    }

    /// Run the trace to completion (or until `limit` records have been
    /// processed, if given), then render a report for it.
    pub fn run(
        &mut self,
        policy_label: &str,
        run_index: usize,
        limit: Option<usize>,
        progress: Option<&ProgressBar>,
    ) -> Result<String, SimError> {
        let started = std::time::Instant::now();
        let record_count = match limit {
            Some(limit) => limit.min(self.trace.records().len()),
            None => self.trace.records().len(),
        };

        for i in 0..record_count {
            let record = self.trace.records()[i].clone();
            self.clock.advance_to(SimTime(record.timestamp))?;
            self.storage.now = self.clock.now();
            if let Err(err) = self.dispatch(&record) {
                eprintln!("record {i} at {}: {err}", self.storage.now);
                return Err(err);
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        self.storage
            .check_invariants()
            .map_err(|source| SimError::Storage { source })?;

        Ok(report::format_report(
            policy_label,
            run_index,
            &self.storage.tiers,
            started.elapsed().as_secs_f64(),
        ))
    }

    fn dispatch(&mut self, record: &crate::trace::TraceRecord) -> Result<(), SimError> {
        let now = self.storage.now;
        let default_tier = self.storage.get_default_tier_id();
        let located = self.storage.locate(&record.path);

        match record.op {
            Op::CreateOrAccess => match located {
                None => {
                    self.storage
                        .create_file(default_tier, now, &record.path, record.size_hint, None, false)?;
                }
                Some(tier) => {
                    self.storage.read_file(tier, now, &record.path, true, Cause::None)?;
                }
            },
            Op::Put => match located {
                None => {
                    self.storage
                        .create_file(default_tier, now, &record.path, record.size_hint, None, false)?;
                }
                Some(tier) => {
                    // A PUT to an existing path is an overwrite, not a second
                    // creation — `create_file`'s precondition is `path ∉
                    // content`, so we model re-PUT as a metadata-updating
                    // write instead of recreating the file.
                    self.storage.write_file(tier, now, &record.path, true, Cause::None)?;
                }
            },
            Op::Get | Op::Head => {
                let tier = match located {
                    Some(tier) => tier,
                    None => {
                        if self.strict_trace {
                            return Err(SimError::UnknownPathOnAccess {
                                path: record.path.clone(),
                            });
                        }
                        self.storage
                            .create_file(default_tier, now, &record.path, record.size_hint, None, false)?;
                        default_tier
                    }
                };
                let tier = self.maybe_prefetch(tier, &record.path, now)?;
                self.storage.read_file(tier, now, &record.path, true, Cause::None)?;
            }
            Op::Delete => {
                if let Some(tier) = located {
                    self.storage.delete_file(tier, &record.path)?;
                }
            }
        }
        Ok(())
    }

    /// `simulate_perfect_prefetch`: bring a file onto the default tier before
    /// servicing a read against it, modelling an oracle that always
    /// anticipates the next access.
    fn maybe_prefetch(
        &mut self,
        tier: crate::tier::TierId,
        path: &str,
        now: SimTime,
    ) -> Result<crate::tier::TierId, SimError> {
        let default_tier = self.storage.get_default_tier_id();
        if self.simulate_perfect_prefetch && tier != default_tier {
            self.storage.migrate(path, default_tier, now)?;
            return Ok(default_tier);
        }
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::Tier;
    use crate::trace::TraceRecord;

    struct FixedTrace(Vec<TraceRecord>);

    impl Trace for FixedTrace {
        fn records(&self) -> &[TraceRecord] {
            &self.0
        }
    }

    fn record(ts: f64, op: Op, path: &str, size: u64) -> TraceRecord {
        TraceRecord {
            timestamp: ts,
            op,
            path: path.to_string(),
            size_hint: size,
        }
    }

    fn two_tier_storage() -> StorageManager {
        let ssd = Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.9);
        let hdd = Tier::new("hdd", 1_000_000, 0.0, 1.0);
        StorageManager::new(vec![ssd, hdd])
    }

    #[test]
    fn unknown_path_creation_lands_on_the_default_tier() {
        let trace = Box::new(FixedTrace(vec![record(0.0, Op::Put, "a", 60)]));
        let mut sim = Simulation::new(two_tier_storage(), trace, false, false);
        sim.run("lru", 0, None, None).unwrap();
        assert!(sim.storage().tiers[0].has_file("a"));
    }

    #[test]
    fn non_strict_access_to_unknown_path_implicitly_creates_it() {
        let trace = Box::new(FixedTrace(vec![record(0.0, Op::Get, "a", 60)]));
        let mut sim = Simulation::new(two_tier_storage(), trace, false, false);
        sim.run("lru", 0, None, None).unwrap();
        assert!(sim.storage().tiers[0].has_file("a"));
        assert_eq!(sim.storage().tiers[0].counters.number_of_reads, 1);
    }

    #[test]
    fn strict_trace_rejects_access_to_an_unknown_path() {
        let trace = Box::new(FixedTrace(vec![record(0.0, Op::Get, "a", 60)]));
        let mut sim = Simulation::new(two_tier_storage(), trace, true, false);
        let err = sim.run("lru", 0, None, None).unwrap_err();
        assert!(matches!(err, SimError::UnknownPathOnAccess { .. }));
    }

    #[test]
    fn decreasing_timestamp_is_fatal() {
        let trace = Box::new(FixedTrace(vec![
            record(5.0, Op::Put, "a", 10),
            record(1.0, Op::Put, "b", 10),
        ]));
        let mut sim = Simulation::new(two_tier_storage(), trace, false, false);
        let err = sim.run("lru", 0, None, None).unwrap_err();
        assert!(matches!(err, SimError::TraceOrder { .. }));
    }

    #[test]
    fn read_of_a_file_on_a_slower_tier_is_served_there() {
        let mut storage = two_tier_storage();
        storage
            .create_file(1, SimTime::ZERO, "a", 60, None, false)
            .unwrap();
        let trace = Box::new(FixedTrace(vec![record(2.0, Op::Get, "a", 0)]));
        let mut sim = Simulation::new(storage, trace, false, false);
        sim.run("lru", 0, None, None).unwrap();
        assert!(sim.storage().tiers[1].has_file("a"));
        assert_eq!(sim.storage().tiers[1].counters.number_of_reads, 1);
        let a = sim.storage().get_file("a").unwrap();
        assert_eq!(a.last_access, SimTime::seconds(2.0));
    }

    #[test]
    fn perfect_prefetch_migrates_before_reading() {
        let mut storage = two_tier_storage();
        // Seed "a" directly on hdd (tier 1), as if an earlier eviction had
        // already demoted it there.
        storage
            .create_file(1, SimTime::ZERO, "a", 60, None, false)
            .unwrap();
        let trace = Box::new(FixedTrace(vec![record(2.0, Op::Get, "a", 0)]));
        let mut sim = Simulation::new(storage, trace, false, true);
        sim.run("lru", 0, None, None).unwrap();
        // The perfect prefetcher brings "a" back to ssd (the default tier)
        // before servicing the read there.
        assert!(sim.storage().tiers[0].has_file("a"));
        assert_eq!(sim.storage().tiers[0].counters.number_of_reads, 1);
        assert_eq!(sim.storage().tiers[0].counters.number_of_prefetching_to_this_tier, 1);
    }

    #[test]
    fn delete_removes_the_file_from_wherever_it_resides() {
        let trace = Box::new(FixedTrace(vec![
            record(0.0, Op::Put, "a", 60),
            record(1.0, Op::Delete, "a", 0),
        ]));
        let mut sim = Simulation::new(two_tier_storage(), trace, false, false);
        sim.run("lru", 0, None, None).unwrap();
        assert!(sim.storage().get_file("a").is_none());
    }

    #[test]
    fn trace_limit_truncates_the_record_stream() {
        let trace = Box::new(FixedTrace(vec![
            record(0.0, Op::Put, "a", 10),
            record(1.0, Op::Put, "b", 10),
            record(2.0, Op::Put, "c", 10),
        ]));
        let mut sim = Simulation::new(two_tier_storage(), trace, false, false);
        sim.run("lru", 0, Some(1), None).unwrap();
        assert!(sim.storage().get_file("a").is_some());
        assert!(sim.storage().get_file("b").is_none());
    }
}
