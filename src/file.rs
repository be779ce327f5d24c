//! File records held inside a [`crate::tier::Tier`]'s content index.

use crate::clock::SimTime;
use crate::tier::TierId;

/// A file as tracked by the simulator. Identity is `path`; everything else is
/// mutable. `tier` is a non-owning back-reference (an index, not a pointer),
/// the same trick `Block`/device-id newtypes use to sidestep aliased
/// ownership between the index and the thing indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub path: String,
    pub size: u64,
    pub creation_time: SimTime,
    pub last_modification: SimTime,
    pub last_access: SimTime,
    pub user: String,
    pub tier: TierId,
}

pub const DEFAULT_USER: &str = "default_user";

impl File {
    pub fn new(path: impl Into<String>, tier: TierId, size: u64, now: SimTime) -> Self {
        File {
            path: path.into(),
            size,
            creation_time: now,
            last_modification: now,
            last_access: now,
            user: DEFAULT_USER.to_string(),
            tier,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}
