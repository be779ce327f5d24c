//! First-in-first-out eviction: same admission/drain shape as [`super::lru`],
//! except accesses never reorder the queue. Kept as its own struct rather
//! than wrapping `LruPolicy`, keeping `lru` and `fifo` as separate,
//! independently-read implementations rather than one inheriting from the
//! other.

use std::collections::VecDeque;

use super::{warn_no_next_tier, Policy};
use crate::file::File;
use crate::storage::StorageManager;
use crate::tier::TierId;

pub struct FifoPolicy {
    home_tier: TierId,
    /// Creation order, oldest at the front.
    order: VecDeque<String>,
}

impl FifoPolicy {
    pub fn new(home_tier: TierId) -> Self {
        FifoPolicy {
            home_tier,
            order: VecDeque::new(),
        }
    }
}

impl Policy for FifoPolicy {
    fn on_file_created(&mut self, _storage: &mut StorageManager, file: &File) {
        self.order.push_back(file.path.clone());
    }

    fn on_file_deleted(&mut self, _storage: &mut StorageManager, file: &File) {
        if let Some(pos) = self.order.iter().position(|p| p == &file.path) {
            self.order.remove(pos);
        }
    }

    fn on_file_access(&mut self, _storage: &mut StorageManager, _file: &File, _is_write: bool) {
        // Access order is irrelevant to FIFO by definition.
    }

    fn on_tier_nearly_full(&mut self, storage: &mut StorageManager) {
        let target = self.home_tier + 1;
        if target >= storage.tiers.len() {
            warn_no_next_tier(storage, self.home_tier);
            return;
        }

        let low_water = storage.tiers[self.home_tier].low_water_mark();
        let now = storage.now;
        while (storage.tiers[self.home_tier].used_size as f64) > low_water {
            let Some(path) = self.order.pop_front() else {
                break;
            };
            if !storage.tiers[self.home_tier].has_file(&path) {
                continue;
            }
            if let Err(err) = storage.migrate(&path, target, now) {
                eprintln!("fifo: migration of \"{path}\" failed: {err}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::clock::SimTime;
    use crate::tier::{Cause, Tier};

    fn rig() -> StorageManager {
        let ssd = Tier::new("ssd", 100, 0.0, 1.0).with_target_occupation(0.9);
        let hdd = Tier::new("hdd", 1_000_000, 0.0, 1.0);
        let mut storage = StorageManager::new(vec![ssd, hdd]);
        let policy: Rc<RefCell<dyn Policy>> = Rc::new(RefCell::new(FifoPolicy::new(0)));
        storage.attach_policy(0, policy);
        storage
    }

    #[test]
    fn evicts_the_earliest_created_file_regardless_of_access() {
        let mut storage = rig();
        storage.now = SimTime::ZERO;
        storage.create_file(0, SimTime::ZERO, "a", 40, None, false).unwrap();
        storage.create_file(0, SimTime::seconds(1.0), "b", 40, None, false).unwrap();

        // Accessing "a" does NOT reorder FIFO, unlike LRU.
        storage.now = SimTime::seconds(2.0);
        storage.read_file(0, SimTime::seconds(2.0), "a", true, Cause::None).unwrap();

        storage.now = SimTime::seconds(3.0);
        storage.create_file(0, SimTime::seconds(3.0), "c", 20, None, false).unwrap();

        assert!(!storage.tiers[0].has_file("a"));
        assert!(storage.tiers[0].has_file("b"));
        assert!(storage.tiers[0].has_file("c"));
        assert!(storage.tiers[1].has_file("a"));
    }
}
