//! Multi-criteria eviction (§4.4): every resident file gets a weighted score
//! from four criteria, and the tier drains highest-score-first until it's
//! back under its low-water mark.
//!
//! - C1 — lifetime progress: how far through its predicted lifetime a file
//!   is (age / predicted lifetime); 0 with no prediction.
//! - C2 — size penalty: `log10(size) / log10(largest resident file)`, so
//!   bigger files are preferred for eviction.
//! - C3 — user footprint equity: the requesting user's total resident bytes
//!   on this tier (accumulated over every create/delete this policy has
//!   seen), divided by the tier's target occupation.
//! - C4 — same shape as C3, but restricted to the user's files accessed
//!   within a trailing window (default 30 minutes) of `now`. This is
//!   deliberately *not* a copy of C3: restricting to recently-touched files
//!   makes C4 track short-term churn rather than the user's whole footprint.

use std::cmp::Ordering;
use std::collections::HashMap;

use priority_queue::DoublePriorityQueue;

use super::{warn_no_next_tier, LifetimeModel, Policy};
use crate::clock::SimTime;
use crate::file::File;
use crate::storage::StorageManager;
use crate::tier::{Tier, TierId};

const DEFAULT_C4_WINDOW_SECS: f64 = 1800.0;

/// `f64` composite score, totally ordered for `DoublePriorityQueue`'s `Ord`
/// bound — scores are sums of finite ratios/logs, never NaN in practice.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedScore(f64);

impl Eq for OrderedScore {}

impl PartialOrd for OrderedScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub struct CriteriaPolicy {
    home_tier: TierId,
    prediction_model: LifetimeModel,
    /// Per-user resident bytes on this tier, updated on create/delete.
    users: HashMap<String, i64>,
    c1_weight: f64,
    c2_weight: f64,
    c3_weight: f64,
    c4_weight: f64,
    c4_window_secs: f64,
}

impl CriteriaPolicy {
    pub fn new(home_tier: TierId, prediction_model: LifetimeModel) -> Self {
        CriteriaPolicy {
            home_tier,
            prediction_model,
            users: HashMap::new(),
            c1_weight: 1.0,
            c2_weight: 1.0,
            c3_weight: 1.0,
            c4_weight: 1.0,
            c4_window_secs: DEFAULT_C4_WINDOW_SECS,
        }
    }

    pub fn with_weights(mut self, c1: f64, c2: f64, c3: f64, c4: f64) -> Self {
        self.c1_weight = c1;
        self.c2_weight = c2;
        self.c3_weight = c3;
        self.c4_weight = c4;
        self
    }

    pub fn with_c4_window_secs(mut self, secs: f64) -> Self {
        self.c4_window_secs = secs;
        self
    }

    fn c1_lifetime_progress(&self, file: &File, now: SimTime) -> f64 {
        match self.prediction_model.get(&file.path) {
            Some(&predicted_lifetime) if predicted_lifetime.abs() > f64::EPSILON => {
                (now.0 - file.creation_time.0) / predicted_lifetime
            }
            _ => 0.0,
        }
    }

    fn c3_user_footprint(&self, file: &File, target_occupation: f64) -> f64 {
        let footprint = *self.users.get(&file.user).unwrap_or(&0) as f64;
        footprint / target_occupation
    }

    fn c4_windowed_user_footprint(&self, tier: &Tier, file: &File, now: SimTime, target_occupation: f64) -> f64 {
        let footprint: u64 = tier
            .content
            .values()
            .filter(|other| other.user == file.user)
            .filter(|other| now.0 - other.last_access.0 <= self.c4_window_secs)
            .map(|other| other.size)
            .sum();
        footprint as f64 / target_occupation
    }

    fn score(&self, file: &File, tier: &Tier, now: SimTime, biggest: u64) -> f64 {
        let target_occupation = tier.target_occupation;
        let c1 = self.c1_lifetime_progress(file, now);
        let c2 = (file.size.max(1) as f64).log10() / (biggest.max(2) as f64).log10();
        let c3 = self.c3_user_footprint(file, target_occupation);
        let c4 = self.c4_windowed_user_footprint(tier, file, now, target_occupation);
        self.c1_weight * c1 + self.c2_weight * c2 + self.c3_weight * c3 + self.c4_weight * c4
    }
}

impl Policy for CriteriaPolicy {
    fn on_file_created(&mut self, _storage: &mut StorageManager, file: &File) {
        *self.users.entry(file.user.clone()).or_insert(0) += file.size as i64;
    }

    fn on_file_deleted(&mut self, _storage: &mut StorageManager, file: &File) {
        if let Some(total) = self.users.get_mut(&file.user) {
            *total -= file.size as i64;
        }
    }

    fn on_file_access(&mut self, _storage: &mut StorageManager, _file: &File, _is_write: bool) {
        // Residency churn is tracked via create/delete; C4 reads `last_access`
        // directly off the resident files rather than a separate log.
    }

    fn on_tier_nearly_full(&mut self, storage: &mut StorageManager) {
        let target = self.home_tier + 1;
        if target >= storage.tiers.len() {
            warn_no_next_tier(storage, self.home_tier);
            return;
        }

        let now = storage.now;
        let (low_water, mut queue) = {
            let tier = &storage.tiers[self.home_tier];
            let low_water = tier.low_water_mark();
            let biggest = tier.content.values().map(|f| f.size).max().unwrap_or(1);
            let mut queue = DoublePriorityQueue::new();
            for file in tier.content.values() {
                let score = self.score(file, tier, now, biggest);
                queue.push(file.path.clone(), OrderedScore(score));
            }
            (low_water, queue)
        };

        // Drain highest-score-first; a `DoublePriorityQueue` pop is O(log n)
        // against a `Vec::sort` top-K pattern, and avoids re-sorting the
        // whole tier on every iteration when only the front of the order is
        // consumed.
        while (storage.tiers[self.home_tier].used_size as f64) > low_water {
            let Some((path, _score)) = queue.pop_max() else {
                break;
            };
            if !storage.tiers[self.home_tier].has_file(&path) {
                continue;
            }
            if let Err(err) = storage.migrate(&path, target, now) {
                eprintln!("criteria: migration of \"{path}\" failed: {err}");
                break;
            }
        }
    }
}
