//! The index over tiers: file lookup, the default-tier rule, and the atomic
//! `migrate` protocol.
//!
//! Listener dispatch lives here rather than on `Tier` itself. A policy
//! reacting to a callback needs `&mut StorageManager` (to call `migrate`), and
//! `StorageManager` is what owns both the tiers and the policies — so it has
//! to be the thing doing the fan-out. Policies are kept behind
//! `Rc<RefCell<dyn Policy>>` rather than moved in and out of a `Vec` for the
//! duration of a callback: a listener's own side effects (e.g. triggering a
//! migration) need `self.policies` to still be intact while the outer
//! callback is still running on the call stack.
//!
//! That reentrancy is not confined to a different tier's listeners: `migrate`
//! (§4.3) reads and then deletes the file on the *source* tier as steps 4/5,
//! which is exactly the tier whose `on_tier_nearly_full` callback is what
//! triggered the migration in the first place. So the policy currently
//! executing is also a listener on the tier being read from and deleted from
//! — a second `borrow_mut()` of the same `RefCell` while the first is still
//! on the stack. `dispatch_to` below handles this: it tries `try_borrow_mut`
//! first, and if the policy is already borrowed further up the stack, queues
//! the event in `pending` instead of panicking. Once the outer call for that
//! same listener id returns and drops its `RefMut`, `dispatch_to` drains and
//! replays anything queued for it, in the order it was queued — so the
//! listener still sees every callback, just not reentrantly. See `DESIGN.md`
//! for the full reasoning.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::clock::SimTime;
use crate::error::{SimError, StorageError};
use crate::file::File;
use crate::policy::Policy;
use crate::tier::{Cause, Tier, TierId};

/// A callback that couldn't be delivered immediately because the target
/// listener was already executing further up the call stack (see the module
/// doc). Replayed, in order, once that outer call releases its borrow.
enum PendingEvent {
    Created(File),
    Deleted(File),
    Access(File, bool),
    NearlyFull,
}

pub struct StorageManager {
    pub tiers: Vec<Tier>,
    pub policies: Vec<Rc<RefCell<dyn Policy>>>,
    pub default_tier_index: TierId,
    /// Mirror of the driver's clock, refreshed once per trace record. Policies
    /// read this to timestamp the migrations they trigger from inside a
    /// callback, since `Policy`'s methods don't carry a timestamp of their own.
    pub now: SimTime,
    /// Per-event trace of fired callbacks for `latest.log` (§6), populated
    /// only when `--verbose` is set (see `with_event_log`). `None` in the
    /// common case so a non-verbose run pays no bookkeeping cost.
    event_log: Option<Vec<String>>,
    /// Events deferred by `dispatch_to` because the target listener was
    /// already mid-callback; keyed by listener id (index into `policies`).
    pending: HashMap<usize, VecDeque<PendingEvent>>,
}

impl StorageManager {
    pub fn new(tiers: Vec<Tier>) -> Self {
        StorageManager {
            tiers,
            policies: Vec::new(),
            default_tier_index: 0,
            now: SimTime::ZERO,
            event_log: None,
            pending: HashMap::new(),
        }
    }

    /// Opt into collecting a per-event callback trace (`--verbose`).
    pub fn with_event_log(mut self) -> Self {
        self.event_log = Some(Vec::new());
        self
    }

    /// The collected trace, if `--verbose` turned it on; empty otherwise.
    pub fn event_log_lines(&self) -> &[String] {
        self.event_log.as_deref().unwrap_or(&[])
    }

    fn log_event(&mut self, line: impl Into<String>) {
        if let Some(log) = &mut self.event_log {
            log.push(format!("{} {}", self.now, line.into()));
        }
    }

    pub fn get_default_tier_id(&self) -> TierId {
        self.default_tier_index
    }

    pub fn get_default_tier(&self) -> &Tier {
        &self.tiers[self.default_tier_index]
    }

    /// Attach a policy to a tier; it starts receiving that tier's callbacks
    /// from this point on, in registration order relative to any other
    /// listener already attached.
    pub fn attach_policy(&mut self, tier: TierId, policy: Rc<RefCell<dyn Policy>>) {
        let id = self.policies.len();
        self.policies.push(policy);
        self.tiers[tier].listeners.push(id);
    }

    /// Linear scan over tiers for the unique file at `path`, per §4.3.
    pub fn get_file(&self, path: &str) -> Option<File> {
        self.tiers
            .iter()
            .find_map(|tier| tier.content.get(path).cloned())
    }

    pub fn locate(&self, path: &str) -> Option<TierId> {
        self.tiers.iter().position(|tier| tier.has_file(path))
    }

    /// Deliver `event` to listener `id`, or queue it if that listener is
    /// already executing further up the call stack (see the module doc).
    /// After a direct delivery returns, drains and replays — in order —
    /// anything that got queued for this same `id` while it ran, so a
    /// listener never misses a callback even though it can't receive it
    /// reentrantly.
    fn dispatch_to(&mut self, id: usize, event: PendingEvent) {
        let policy = self.policies[id].clone();
        let mut guard = match policy.try_borrow_mut() {
            Ok(guard) => guard,
            Err(_) => {
                self.pending.entry(id).or_default().push_back(event);
                return;
            }
        };
        match event {
            PendingEvent::Created(file) => guard.on_file_created(self, &file),
            PendingEvent::Deleted(file) => guard.on_file_deleted(self, &file),
            PendingEvent::Access(file, is_write) => guard.on_file_access(self, &file, is_write),
            PendingEvent::NearlyFull => guard.on_tier_nearly_full(self),
        }
        drop(guard);
        while let Some(queued) = self.pending.get_mut(&id).and_then(|q| q.pop_front()) {
            self.dispatch_to(id, queued);
        }
    }

    fn fire_created(&mut self, tier: TierId, file: &File) {
        self.log_event(format!(
            "on_file_created tier={} path={}",
            self.tiers[tier].name, file.path
        ));
        let ids = self.tiers[tier].listeners.clone();
        for id in ids {
            self.dispatch_to(id, PendingEvent::Created(file.clone()));
        }
    }

    fn fire_deleted(&mut self, tier: TierId, file: &File) {
        self.log_event(format!(
            "on_file_deleted tier={} path={}",
            self.tiers[tier].name, file.path
        ));
        let ids = self.tiers[tier].listeners.clone();
        for id in ids {
            self.dispatch_to(id, PendingEvent::Deleted(file.clone()));
        }
    }

    fn fire_access(&mut self, tier: TierId, file: &File, is_write: bool) {
        self.log_event(format!(
            "on_file_access tier={} path={} write={}",
            self.tiers[tier].name, file.path, is_write
        ));
        let ids = self.tiers[tier].listeners.clone();
        for id in ids {
            self.dispatch_to(id, PendingEvent::Access(file.clone(), is_write));
        }
    }

    fn fire_nearly_full(&mut self, tier: TierId) {
        self.log_event(format!("on_tier_nearly_full tier={}", self.tiers[tier].name));
        let ids = self.tiers[tier].listeners.clone();
        for id in ids {
            self.dispatch_to(id, PendingEvent::NearlyFull);
        }
    }

    /// `create_file(ts, path, size, from_file?, migration?)` from §4.2.
    /// `from` carries the timestamps/user to preserve when this create is one
    /// leg of a migration; otherwise the new file is stamped with `ts`.
    pub fn create_file(
        &mut self,
        tier: TierId,
        ts: SimTime,
        path: &str,
        size: u64,
        from: Option<&File>,
        migration: bool,
    ) -> Result<f64, SimError> {
        let file = match from {
            Some(existing) => File {
                path: path.to_string(),
                size,
                creation_time: existing.creation_time,
                last_modification: existing.last_modification,
                last_access: existing.last_access,
                user: existing.user.clone(),
                tier,
            },
            None => File::new(path, tier, size, ts),
        };

        let latency = {
            let t = &mut self.tiers[tier];
            t.insert(file.clone());
            t.counters.time_spent_writing += t.latency;
            t.latency
        };

        self.fire_created(tier, &file);

        let t = &self.tiers[tier];
        if !migration && t.is_nearly_full() && !t.currently_migrating {
            self.tiers[tier].currently_migrating = true;
            self.fire_nearly_full(tier);
            self.tiers[tier].currently_migrating = false;
        }

        Ok(latency)
    }

    /// `read_file(ts, path, update_meta, cause)` from §4.2.
    pub fn read_file(
        &mut self,
        tier: TierId,
        ts: SimTime,
        path: &str,
        update_meta: bool,
        cause: Cause,
    ) -> Result<f64, SimError> {
        let (delay, file) = {
            let t = &mut self.tiers[tier];
            let file = t
                .content
                .get_mut(path)
                .ok_or_else(|| StorageError::FileNotFound {
                    tier: t.name.clone(),
                    path: path.to_string(),
                })?;
            if update_meta {
                file.last_access = ts;
            }
            let delay = t.latency + file.size as f64 / t.throughput;
            t.counters.number_of_reads += 1;
            t.counters.time_spent_reading += delay;
            match cause {
                Cause::Eviction => t.counters.number_of_eviction_from_this_tier += 1,
                Cause::Prefetching => t.counters.number_of_prefetching_from_this_tier += 1,
                Cause::None => {}
            }
            (delay, file.clone())
        };
        self.fire_access(tier, &file, false);
        Ok(delay)
    }

    /// `write_file(ts, path, update_meta, cause)` from §4.2.
    pub fn write_file(
        &mut self,
        tier: TierId,
        ts: SimTime,
        path: &str,
        update_meta: bool,
        cause: Cause,
    ) -> Result<f64, SimError> {
        let (delay, file) = {
            let t = &mut self.tiers[tier];
            let file = t
                .content
                .get_mut(path)
                .ok_or_else(|| StorageError::FileNotFound {
                    tier: t.name.clone(),
                    path: path.to_string(),
                })?;
            if update_meta {
                file.last_access = ts;
                file.last_modification = ts;
            }
            let delay = t.latency + file.size as f64 / t.throughput;
            t.counters.number_of_write += 1;
            t.counters.time_spent_writing += delay;
            match cause {
                Cause::Eviction => t.counters.number_of_eviction_to_this_tier += 1,
                Cause::Prefetching => t.counters.number_of_prefetching_to_this_tier += 1,
                Cause::None => {}
            }
            (delay, file.clone())
        };
        self.fire_access(tier, &file, true);
        Ok(delay)
    }

    /// `delete_file(path)` from §4.2. A no-op (not an error) if the path is
    /// already gone from this tier.
    pub fn delete_file(&mut self, tier: TierId, path: &str) -> Result<f64, SimError> {
        let removed = self.tiers[tier].remove(path);
        if let Some(file) = removed {
            self.fire_deleted(tier, &file);
        }
        Ok(0.0)
    }

    /// The atomic relocation protocol of §4.3: create on `target`, then the
    /// overlapped read/write pair, then delete from `source`. Returns the
    /// notional total delay (§4.3 step 6).
    pub fn migrate(&mut self, path: &str, target: TierId, ts: SimTime) -> Result<f64, SimError> {
        let source = match self.locate(path) {
            Some(t) => t,
            None => {
                return Err(SimError::Storage {
                    source: StorageError::FileNotFound {
                        tier: "<any>".to_string(),
                        path: path.to_string(),
                    },
                })
            }
        };

        if source == target || self.tiers[target].has_file(path) {
            return Ok(0.0);
        }

        let cause = if source < target {
            Cause::Eviction
        } else {
            Cause::Prefetching
        };

        let moving = self
            .tiers[source]
            .content
            .get(path)
            .cloned()
            .expect("locate() guarantees presence");

        let mut delay = self.create_file(target, ts, path, moving.size, Some(&moving), true)?;
        let read_delay = self.read_file(source, ts, path, false, cause)?;
        let write_delay = self.write_file(target, ts, path, false, cause)?;
        delay += read_delay.max(write_delay);
        delay += self.delete_file(source, path)?;
        Ok(delay)
    }

    /// §8 invariant 1, exposed for the test suite and for a fatal
    /// `InvariantViolation` check the driver can run after each record.
    pub fn check_invariants(&self) -> Result<(), StorageError> {
        let mut seen = std::collections::HashSet::new();
        for tier in &self.tiers {
            let observed = tier.observed_used_size();
            if observed != tier.used_size {
                return Err(StorageError::SizeMismatch {
                    tier: tier.name.clone(),
                    used_size: tier.used_size,
                    observed,
                });
            }
            for path in tier.content.keys() {
                if !seen.insert(path.clone()) {
                    return Err(StorageError::DuplicatePath(path.clone()));
                }
            }
        }
        Ok(())
    }
}
