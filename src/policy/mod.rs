//! Placement policies: the callback interface storage fires into (§4.4) and
//! the dispatch table used to build one from a CLI/config name, in the shape
//! of a `PlacementPolicy` trait plus a `PlacementConfig` enum.

mod criteria;
mod fifo;
mod lifetime;
mod lru;
mod random;

pub use criteria::CriteriaPolicy;
pub use fifo::FifoPolicy;
pub use lifetime::LifetimeOverrunPolicy;
pub use lru::LruPolicy;
pub use random::RandomPolicy;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Deserialize;
use strum::{Display, EnumIter, EnumString};

use crate::file::File;
use crate::storage::StorageManager;
use crate::tier::TierId;

/// The four events a policy can react to (§4.4). A policy is attached to
/// exactly one tier and only ever sees that tier's events; it reaches into
/// `storage` to call `migrate` on files it decides to relocate.
pub trait Policy {
    fn on_file_created(&mut self, storage: &mut StorageManager, file: &File);
    fn on_file_deleted(&mut self, storage: &mut StorageManager, file: &File);
    fn on_file_access(&mut self, storage: &mut StorageManager, file: &File, is_write: bool);
    fn on_tier_nearly_full(&mut self, storage: &mut StorageManager);
}

/// The policies a tier can be configured with, named the way they're spelled
/// on the command line and in `policy.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, EnumIter, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PolicyKind {
    Lru,
    Fifo,
    Random,
    Lifetime,
    Criteria,
}

/// Per-file predicted lifetime (creation timestamp of the predicted delete),
/// shared read-only by the lifetime-overrun and criteria policies. Keyed by
/// path, seconds since the start of the run — see §4.4 and
/// `original_source/traces/*` for where this model comes from.
pub type LifetimeModel = Rc<HashMap<String, f64>>;

impl PolicyKind {
    /// Build a fresh policy instance bound to `tier`. `seed` only matters for
    /// `Random`; `lifetime_model` only matters for `Lifetime` and `Criteria`
    /// (an absent model degrades both to their LRU fallback, since every
    /// overrun-amount lookup then comes back empty).
    pub fn build(
        &self,
        tier: TierId,
        seed: u64,
        lifetime_model: Option<LifetimeModel>,
    ) -> Rc<RefCell<dyn Policy>> {
        let model = lifetime_model.unwrap_or_else(|| Rc::new(HashMap::new()));
        match self {
            PolicyKind::Lru => Rc::new(RefCell::new(LruPolicy::new(tier))),
            PolicyKind::Fifo => Rc::new(RefCell::new(FifoPolicy::new(tier))),
            PolicyKind::Random => Rc::new(RefCell::new(RandomPolicy::new(tier, seed))),
            PolicyKind::Lifetime => {
                Rc::new(RefCell::new(LifetimeOverrunPolicy::new(tier, model)))
            }
            PolicyKind::Criteria => Rc::new(RefCell::new(CriteriaPolicy::new(tier, model))),
        }
    }
}

/// Shared by every drain-style policy: warn and bail out when a tier has no
/// next tier to discharge onto (the last tier in the stack is a sink).
pub(crate) fn warn_no_next_tier(storage: &StorageManager, tier: TierId) {
    use colored::Colorize;
    eprintln!(
        "{}",
        format!(
            "tier \"{}\" is nearly full but is the last tier in the stack; nothing to discharge onto",
            storage.tiers[tier].name
        )
        .yellow()
    );
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::tier::Tier;

    #[test]
    fn build_attaches_a_working_policy_to_its_tier() {
        let mut storage = StorageManager::new(vec![
            Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.9),
            Tier::new("hdd", 1_000_000, 0.0, 1.0),
        ]);
        let built = PolicyKind::Lru.build(0, 0, None);
        storage.attach_policy(0, built);

        storage
            .create_file(0, crate::clock::SimTime::ZERO, "a", 95, None, false)
            .unwrap();
        // The built LRU policy should have reacted to the nearly-full event
        // triggered by this create and migrated "a" onward.
        assert!(!storage.tiers[0].has_file("a"));
        assert!(storage.tiers[1].has_file("a"));
    }

    #[test]
    fn policy_kind_round_trips_through_its_string_name() {
        for kind in PolicyKind::iter() {
            let rendered = kind.to_string();
            let parsed: PolicyKind = rendered.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }
}
