use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a particle, persisting across rank migration.
///
/// Ids are assigned once at system setup (or by a reactive extension when it
/// creates a particle) and never change, no matter how often the spatial
/// decomposition reassigns the particle to another rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticleId {
    fn from(raw: u64) -> Self {
        ParticleId(raw)
    }
}

/// Which arena of the host store a [`ParticleRef`] points into.
///
/// `Site` refs resolve against the ordinary particle arena (real particles
/// and their ghosts); `Representative` refs resolve against the atomistic
/// side-arena used by the representative-resolution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Realm {
    Site,
    Representative,
}

/// A rank-local handle to a resolved particle.
///
/// The handle is an arena slot index tagged with the decomposition epoch it
/// was issued in. Dereferencing a ref whose epoch no longer matches the
/// store's current epoch yields `None` — a working-list entry accidentally
/// retained past a rebuild is detectable instead of silently pointing at
/// reused memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleRef {
    realm: Realm,
    slot: u32,
    epoch: u32,
}

impl ParticleRef {
    pub fn new(realm: Realm, slot: u32, epoch: u32) -> Self {
        Self { realm, slot, epoch }
    }

    #[inline]
    pub fn realm(&self) -> Realm {
        self.realm
    }

    #[inline]
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// The decomposition epoch this handle was issued in.
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

/// Minimal per-particle state carried by the reference host store.
///
/// The generic particle payload exchanged during migration is owned by the
/// host; only id and position matter to this crate (positions are read when
/// freezing geometric payloads at relationship creation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub position: [f64; 3],
}

impl Particle {
    pub fn new(id: impl Into<ParticleId>, position: [f64; 3]) -> Self {
        Self { id: id.into(), position }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_from_different_epochs_differ() {
        let a = ParticleRef::new(Realm::Site, 3, 1);
        let b = ParticleRef::new(Realm::Site, 3, 2);
        assert_ne!(a, b);
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn particle_id_displays_raw_value() {
        assert_eq!(ParticleId(42).to_string(), "42");
    }
}
