//! IDs for entities in the G10 engine.

use nohash_hasher::{BuildNoHashHasher, IsEnabled};
use std::{
    collections::HashSet,
    fmt,
    hash::{self, Hash},
};

/// Unique ID identifying an entity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityID(u64);

/// Manages provision and registration of [`EntityID`]s.
#[derive(Debug, Default)]
pub struct EntityIDManager {
    ids_in_use: HashSet<u64, BuildNoHashHasher<u64>>,
    id_counter: u64,
}

impl EntityID {
    /// Converts the given `u64` into an entity ID.
    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Returns the `u64` value corresponding to the entity ID.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Hash for EntityID {
    #[inline]
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u64(self.0);
    }
}

impl IsEnabled for EntityID {}

impl fmt::Display for EntityID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

impl EntityIDManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a unique entity ID.
    pub fn provide_id(&mut self) -> EntityID {
        while self.ids_in_use.contains(&self.id_counter) {
            self.id_counter += 1;
        }
        self.ids_in_use.insert(self.id_counter);
        EntityID(self.id_counter)
    }

    /// Marks the given entity ID as no longer in use.
    pub fn unregister_id(&mut self, id: EntityID) {
        self.ids_in_use.remove(&id.0);
    }
}
