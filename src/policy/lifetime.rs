//! Lifetime-overrun eviction (§4.4): files that have already outlived their
//! predicted lifetime go first, most-overrun first; once the overrun list is
//! exhausted but the tier is still above its low-water mark, fall back to
//! plain LRU order over whatever's left.

use std::collections::VecDeque;

use super::{warn_no_next_tier, LifetimeModel, Policy};
use crate::clock::SimTime;
use crate::file::File;
use crate::storage::StorageManager;
use crate::tier::TierId;

pub struct LifetimeOverrunPolicy {
    home_tier: TierId,
    prediction_model: LifetimeModel,
    /// LRU fallback order, maintained the same way `LruPolicy` does.
    order: VecDeque<String>,
}

impl LifetimeOverrunPolicy {
    pub fn new(home_tier: TierId, prediction_model: LifetimeModel) -> Self {
        LifetimeOverrunPolicy {
            home_tier,
            prediction_model,
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, path: &str) {
        if let Some(pos) = self.order.iter().position(|p| p == path) {
            let entry = self.order.remove(pos).unwrap();
            self.order.push_back(entry);
        }
    }

    fn forget(&mut self, path: &str) {
        if let Some(pos) = self.order.iter().position(|p| p == path) {
            self.order.remove(pos);
        }
    }

    /// Predicted-lifetime overrun at `now`, in seconds; `None` if this file
    /// has no prediction or hasn't overrun yet.
    fn overrun(&self, file: &File, now: SimTime) -> Option<f64> {
        let predicted_lifetime = self.prediction_model.get(&file.path)?;
        let age = now.0 - file.creation_time.0;
        let overrun = age - predicted_lifetime;
        (overrun > 0.0).then_some(overrun)
    }
}

impl Policy for LifetimeOverrunPolicy {
    fn on_file_created(&mut self, _storage: &mut StorageManager, file: &File) {
        self.order.push_back(file.path.clone());
    }

    fn on_file_deleted(&mut self, _storage: &mut StorageManager, file: &File) {
        self.forget(&file.path);
    }

    fn on_file_access(&mut self, _storage: &mut StorageManager, file: &File, _is_write: bool) {
        self.touch(&file.path);
    }

    fn on_tier_nearly_full(&mut self, storage: &mut StorageManager) {
        let target = self.home_tier + 1;
        if target >= storage.tiers.len() {
            warn_no_next_tier(storage, self.home_tier);
            return;
        }

        let now = storage.now;
        let low_water = storage.tiers[self.home_tier].low_water_mark();

        let mut overrun: Vec<(f64, String)> = storage.tiers[self.home_tier]
            .content
            .values()
            .filter_map(|file| {
                self.overrun(file, now)
                    .map(|amount| (amount, file.path.clone()))
            })
            .collect();
        overrun.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        for (_, path) in overrun {
            if (storage.tiers[self.home_tier].used_size as f64) <= low_water {
                break;
            }
            if !storage.tiers[self.home_tier].has_file(&path) {
                continue;
            }
            self.forget(&path);
            if let Err(err) = storage.migrate(&path, target, now) {
                eprintln!("lifetime: migration of \"{path}\" failed: {err}");
                break;
            }
        }

        while (storage.tiers[self.home_tier].used_size as f64) > low_water {
            let Some(path) = self.order.pop_front() else {
                break;
            };
            if !storage.tiers[self.home_tier].has_file(&path) {
                continue;
            }
            if let Err(err) = storage.migrate(&path, target, now) {
                eprintln!("lifetime: fallback migration of \"{path}\" failed: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::tier::Tier;

    fn rig(model: HashMap<String, f64>) -> StorageManager {
        let ssd = Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.9);
        let hdd = Tier::new("hdd", 1_000_000, 0.0, 1.0);
        let mut storage = StorageManager::new(vec![ssd, hdd]);
        let policy: Rc<RefCell<dyn Policy>> =
            Rc::new(RefCell::new(LifetimeOverrunPolicy::new(0, Rc::new(model))));
        storage.attach_policy(0, policy);
        storage
    }

    #[test]
    fn overrun_files_are_evicted_before_non_overrun_files() {
        let mut model = HashMap::new();
        model.insert("a".to_string(), 10.0);
        model.insert("b".to_string(), 1000.0);
        let mut storage = rig(model);

        storage.create_file(0, SimTime::ZERO, "a", 40, None, false).unwrap();
        storage.create_file(0, SimTime::ZERO, "b", 40, None, false).unwrap();
        storage.now = SimTime::seconds(20.0);
        storage.create_file(0, SimTime::seconds(20.0), "c", 20, None, false).unwrap();

        // "a" overran its predicted 10s lifetime by t=20; "b" hasn't.
        assert!(!storage.tiers[0].has_file("a"));
        assert!(storage.tiers[0].has_file("b"));
        assert!(storage.tiers[1].has_file("a"));
    }

    #[test]
    fn falls_back_to_lru_order_once_overrun_list_is_exhausted() {
        let storage_no_model = HashMap::new();
        let mut storage = rig(storage_no_model);
        storage.create_file(0, SimTime::ZERO, "a", 40, None, false).unwrap();
        storage
            .create_file(0, SimTime::seconds(1.0), "b", 40, None, false)
            .unwrap();
        storage.now = SimTime::seconds(2.0);
        storage
            .create_file(0, SimTime::seconds(2.0), "c", 20, None, false)
            .unwrap();

        // No predictions at all: nothing is "overrun", so the LRU fallback
        // evicts the oldest-created file just as plain LRU would.
        assert!(!storage.tiers[0].has_file("a"));
        assert!(storage.tiers[1].has_file("a"));
    }

    #[test]
    fn creation_time_survives_a_migration() {
        let mut model = HashMap::new();
        model.insert("a".to_string(), 5.0);
        let mut storage = rig(model);
        storage
            .create_file(0, SimTime::seconds(3.0), "a", 10, None, false)
            .unwrap();
        storage.migrate("a", 1, SimTime::seconds(9.0)).unwrap();
        let moved = storage.get_file("a").unwrap();
        assert_eq!(moved.creation_time, SimTime::seconds(3.0));
    }
}
