//! Uniform-random eviction. Candidates are drawn without replacement from
//! whatever is still resident on the tier, one at a time, until the tier is
//! back under its low-water mark.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{warn_no_next_tier, Policy};
use crate::file::File;
use crate::storage::StorageManager;
use crate::tier::TierId;

pub struct RandomPolicy {
    home_tier: TierId,
    candidates: Vec<String>,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(home_tier: TierId, seed: u64) -> Self {
        RandomPolicy {
            home_tier,
            candidates: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn on_file_created(&mut self, _storage: &mut StorageManager, file: &File) {
        self.candidates.push(file.path.clone());
    }

    fn on_file_deleted(&mut self, _storage: &mut StorageManager, _file: &File) {
        // Left in `candidates`; `on_tier_nearly_full` checks residency before
        // migrating, so a stale entry is just skipped rather than tracked down
        // and removed here.
    }

    fn on_file_access(&mut self, _storage: &mut StorageManager, _file: &File, _is_write: bool) {}

    fn on_tier_nearly_full(&mut self, storage: &mut StorageManager) {
        let target = self.home_tier + 1;
        if target >= storage.tiers.len() {
            warn_no_next_tier(storage, self.home_tier);
            return;
        }

        let low_water = storage.tiers[self.home_tier].low_water_mark();
        let now = storage.now;
        while (storage.tiers[self.home_tier].used_size as f64) > low_water {
            if self.candidates.is_empty() {
                break;
            }
            let idx = self.rng.gen_range(0..self.candidates.len());
            let path = self.candidates.remove(idx);
            if !storage.tiers[self.home_tier].has_file(&path) {
                continue;
            }
            if let Err(err) = storage.migrate(&path, target, now) {
                eprintln!("random: migration of \"{path}\" failed: {err}");
                break;
            }
        }
    }
}
