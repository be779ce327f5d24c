//! Least-recently-used eviction, the same `VecDeque`-as-queue idiom a
//! `cache::lru` module would use, adapted from a fixed-size cache to a
//! hysteresis-band drain over a tier (§4.4).

use std::collections::VecDeque;

use super::{warn_no_next_tier, Policy};
use crate::file::File;
use crate::storage::StorageManager;
use crate::tier::TierId;

pub struct LruPolicy {
    home_tier: TierId,
    /// Oldest-accessed at the front, most-recently-accessed at the back.
    order: VecDeque<String>,
}

impl LruPolicy {
    pub fn new(home_tier: TierId) -> Self {
        LruPolicy {
            home_tier,
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
}

impl Policy for LruPolicy {
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

        let low_water = storage.tiers[self.home_tier].low_water_mark();
        let now = storage.now;
        while (storage.tiers[self.home_tier].used_size as f64) > low_water {
            let Some(path) = self.order.pop_front() else {
                break;
            };
            if !storage.tiers[self.home_tier].has_file(&path) {
                // Already gone (e.g. deleted since being queued); skip it.
                continue;
            }
            if let Err(err) = storage.migrate(&path, target, now) {
                eprintln!("lru: migration of \"{path}\" failed: {err}");
                break;
            }
        }
    }
}
