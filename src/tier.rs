//! Capacity-bounded container of files plus the per-tier counters used to
//! rank policies.
//!
//! `Tier` itself only holds data: the content index and the counters. Firing
//! listener callbacks and the nearly-full check live on [`crate::storage::StorageManager`],
//! which is the only thing that can hold both the tiers and the policies
//! attached to them without aliasing `&mut self` against itself (see
//! `DESIGN.md`, "Back-references").

use std::collections::HashMap;

use crate::file::File;

/// Index into `StorageManager::tiers`. A plain `usize` rather than a pointer,
/// the same non-owning-handle trick used for `Block`/device ids.
pub type TierId = usize;

/// Why a read/write is happening, for the direction counters in §4.2.
/// `None` is a plain user-driven access; the other two only ever occur as one
/// leg of `StorageManager::migrate`. Because this is a closed Rust enum, the
/// original's dynamic "unknown cause" error class is unrepresentable by
/// construction — `SimError::UnknownOperationCause` is kept for parity with
/// the full taxonomy but is never actually reachable from safe code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    None,
    Eviction,
    Prefetching,
}

/// Monotonically increasing operation counters for one tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierCounters {
    pub number_of_reads: u64,
    pub number_of_write: u64,
    pub number_of_eviction_from_this_tier: u64,
    pub number_of_eviction_to_this_tier: u64,
    pub number_of_prefetching_from_this_tier: u64,
    pub number_of_prefetching_to_this_tier: u64,
    pub time_spent_reading: f64,
    pub time_spent_writing: f64,
}

pub struct Tier {
    pub name: String,
    pub max_size: u64,
    pub used_size: u64,
    pub latency: f64,
    pub throughput: f64,
    pub target_occupation: f64,
    pub content: HashMap<String, File>,
    pub counters: TierCounters,
    /// True strictly while a migration this tier triggered is fanning out its
    /// `on_tier_nearly_full` listeners, blocking reentrant firing (§4.2).
    pub currently_migrating: bool,
    /// Policy indices (into `StorageManager::policies`) attached to this tier,
    /// in registration order.
    pub listeners: Vec<usize>,
}

pub const DEFAULT_TARGET_OCCUPATION: f64 = 0.9;
pub const HYSTERESIS_BAND: f64 = 0.15;

impl Tier {
    pub fn new(name: impl Into<String>, max_size: u64, latency: f64, throughput: f64) -> Self {
        Tier {
            name: name.into(),
            max_size,
            used_size: 0,
            latency,
            throughput,
            target_occupation: DEFAULT_TARGET_OCCUPATION,
            content: HashMap::new(),
            counters: TierCounters::default(),
            currently_migrating: false,
            listeners: Vec::new(),
        }
    }

    pub fn with_target_occupation(mut self, target_occupation: f64) -> Self {
        self.target_occupation = target_occupation;
        self
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.content.contains_key(path)
    }

    pub fn high_water_mark(&self) -> f64 {
        self.max_size as f64 * self.target_occupation
    }

    pub fn low_water_mark(&self) -> f64 {
        self.max_size as f64 * (self.target_occupation - HYSTERESIS_BAND).max(0.0)
    }

    pub fn is_nearly_full(&self) -> bool {
        self.used_size as f64 >= self.high_water_mark()
    }

    /// §8 invariant 1: `used_size == Σ f.size`.
    pub fn observed_used_size(&self) -> u64 {
        self.content.values().map(|f| f.size).sum()
    }

    pub(crate) fn insert(&mut self, file: File) {
        self.used_size += file.size;
        self.content.insert(file.path.clone(), file);
    }

    pub(crate) fn remove(&mut self, path: &str) -> Option<File> {
        let file = self.content.remove(path)?;
        self.used_size = self.used_size.saturating_sub(file.size);
        Some(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimTime;

    fn file(path: &str, size: u64) -> File {
        File::new(path, 0, size, SimTime::ZERO)
    }

    #[test]
    fn high_and_low_water_marks_use_the_hysteresis_band() {
        let tier = Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.9);
        assert_eq!(tier.high_water_mark(), 90.0);
        assert_eq!(tier.low_water_mark(), 75.0);
    }

    #[test]
    fn low_water_mark_never_goes_negative() {
        let tier = Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.05);
        assert_eq!(tier.low_water_mark(), 0.0);
    }

    #[test]
    fn insert_and_remove_track_used_size() {
        let mut tier = Tier::new("ssd", 100, 0.0, 1.0);
        tier.insert(file("a", 40));
        assert_eq!(tier.used_size, 40);
        assert_eq!(tier.observed_used_size(), 40);

        tier.insert(file("b", 20));
        assert_eq!(tier.used_size, 60);

        let removed = tier.remove("a").unwrap();
        assert_eq!(removed.size, 40);
        assert_eq!(tier.used_size, 20);
        assert_eq!(tier.observed_used_size(), 20);
    }

    #[test]
    fn is_nearly_full_triggers_at_the_high_water_mark() {
        let mut tier = Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.9);
        tier.insert(file("a", 89));
        assert!(!tier.is_nearly_full());
        tier.insert(file("b", 1));
        assert!(tier.is_nearly_full());
    }
}
