//! Reference host store: the particle arenas, the lookup services, and the
//! drivers for the three migration lifecycle notifications.
//!
//! The spatial partitioning policy stays with the caller — the store is told
//! *which* particles depart, packs them (and every subscriber's wire payload)
//! into a [`MigrationParcel`] for one point-to-point edge, and unpacks the
//! matching parcel on the receiving rank.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Particle, ParticleId, ParticleRef, Realm};
use crate::topology::Error;

use super::collective::{Collective, SoloComm};
use super::resolver::{HostView, ParticleResolver};
use super::signals::{ExportCtx, ImportCtx, MigrationSignals};
use super::wire::WireBuffer;

/// The matched send/receive payload of one migration edge: the departing
/// particles' generic state plus the topology wire buffer appended by every
/// subscribed list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationParcel {
    pub particles: Vec<Particle>,
    pub buffer: WireBuffer,
}

/// Side-arena for atomistic representative particles.
///
/// Representatives do not take part in the spatial decomposition themselves;
/// they ride along with their coarse-grained virtual site, moved in and out
/// by the representative map's hooks.
#[derive(Debug, Default)]
pub struct AtomisticStore {
    slots: Vec<Option<Particle>>,
    free: Vec<u32>,
    ids: HashMap<ParticleId, u32>,
    epoch: u32,
}

impl AtomisticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_epoch(&mut self, epoch: u32) {
        self.epoch = epoch;
    }

    pub fn insert(&mut self, particle: Particle) {
        debug_assert!(!self.ids.contains_key(&particle.id));
        let id = particle.id;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(particle);
                slot
            }
            None => {
                self.slots.push(Some(particle));
                (self.slots.len() - 1) as u32
            }
        };
        self.ids.insert(id, slot);
    }

    pub fn remove(&mut self, id: ParticleId) -> Option<Particle> {
        let slot = self.ids.remove(&id)?;
        let particle = self.slots[slot as usize].take();
        self.free.push(slot);
        particle
    }

    pub fn lookup(&self, id: ParticleId) -> Option<ParticleRef> {
        let slot = *self.ids.get(&id)?;
        Some(ParticleRef::new(Realm::Representative, slot, self.epoch))
    }

    pub fn resolve(&self, handle: ParticleRef) -> Option<&Particle> {
        if handle.realm() != Realm::Representative || handle.epoch() != self.epoch {
            return None;
        }
        self.slots.get(handle.slot() as usize)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug)]
struct SiteSlot {
    particle: Particle,
    ghost: bool,
}

/// Per-rank particle store and migration-lifecycle driver.
pub struct ParticleStore {
    comm: Rc<dyn Collective>,
    epoch: u32,
    slots: Vec<Option<SiteSlot>>,
    free: Vec<u32>,
    reals: HashMap<ParticleId, u32>,
    locals: HashMap<ParticleId, u32>,
    atomistic: AtomisticStore,
    signals: MigrationSignals,
    box_lengths: Option<[f64; 3]>,
}

impl ParticleStore {
    pub fn new(comm: Rc<dyn Collective>) -> Self {
        info!(rank = comm.rank(), n_ranks = comm.n_ranks(), "particle store created");
        Self {
            comm,
            epoch: 0,
            slots: Vec::new(),
            free: Vec::new(),
            reals: HashMap::new(),
            locals: HashMap::new(),
            atomistic: AtomisticStore::new(),
            signals: MigrationSignals::new(),
            box_lengths: None,
        }
    }

    /// Single-rank store, mainly for setup code and tests.
    pub fn solo() -> Self {
        Self::new(Rc::new(SoloComm))
    }

    /// Enables orthorhombic periodic boundary conditions for displacement
    /// measurements.
    pub fn with_box(mut self, lengths: [f64; 3]) -> Self {
        self.box_lengths = Some(lengths);
        self
    }

    pub fn comm(&self) -> &dyn Collective {
        self.comm.as_ref()
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn signals(&self) -> &MigrationSignals {
        &self.signals
    }

    /// A borrowed host view for the topology lists' explicit operations
    /// (add/remove between communication rounds).
    pub fn view(&self) -> HostView<'_> {
        HostView { resolver: self, comm: self.comm.as_ref(), epoch: self.epoch }
    }

    pub fn n_reals(&self) -> usize {
        self.reals.len()
    }

    pub fn n_ghosts(&self) -> usize {
        self.locals.len() - self.reals.len()
    }

    pub fn contains_real(&self, id: ParticleId) -> bool {
        self.reals.contains_key(&id)
    }

    fn insert_slot(&mut self, particle: Particle, ghost: bool) -> u32 {
        let entry = SiteSlot { particle, ghost };
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                (self.slots.len() - 1) as u32
            }
        }
    }

    pub fn add_real(&mut self, particle: Particle) {
        debug_assert!(!self.locals.contains_key(&particle.id));
        let id = particle.id;
        let slot = self.insert_slot(particle, false);
        self.reals.insert(id, slot);
        self.locals.insert(id, slot);
    }

    pub fn add_atomistic(&mut self, particle: Particle) {
        self.atomistic.insert(particle);
    }

    pub fn atomistic(&self) -> &AtomisticStore {
        &self.atomistic
    }

    /// Dereferences a handle; `None` once the handle's epoch has passed.
    pub fn get(&self, handle: ParticleRef) -> Option<&Particle> {
        match handle.realm() {
            Realm::Site => {
                if handle.epoch() != self.epoch {
                    return None;
                }
                self.slots.get(handle.slot() as usize)?.as_ref().map(|s| &s.particle)
            }
            Realm::Representative => self.atomistic.resolve(handle),
        }
    }

    /// Drops the ghost mirror of `id` if one exists. An arriving real
    /// commonly crosses a nearby boundary and is still mirrored here; the
    /// real replaces the stale mirror.
    fn evict_ghost(&mut self, id: ParticleId) {
        let Some(&slot) = self.locals.get(&id) else {
            return;
        };
        if self.slots[slot as usize].as_ref().is_some_and(|s| s.ghost) {
            self.locals.remove(&id);
            self.slots[slot as usize] = None;
            self.free.push(slot);
        }
    }

    fn take_real(&mut self, id: ParticleId) -> Result<Particle, Error> {
        let slot = self.reals.remove(&id).ok_or(Error::UnknownParticle(id))?;
        self.locals.remove(&id);
        let entry = self.slots[slot as usize].take().expect("indexed slot must be occupied");
        self.free.push(slot);
        Ok(entry.particle)
    }

    /// `beforeMigrate`: removes the departing particles and lets every
    /// subscribed list append its wire payload. The returned parcel is the
    /// payload of one point-to-point send.
    pub fn migrate_out(&mut self, ids: &[ParticleId]) -> Result<MigrationParcel, Error> {
        let mut particles = Vec::with_capacity(ids.len());
        for &id in ids {
            particles.push(self.take_real(id)?);
        }
        debug!(rank = self.comm.rank(), departing = ids.len(), "export phase");
        let mut buffer = WireBuffer::new();
        let mut ctx =
            ExportCtx { departing: ids, buf: &mut buffer, atomistic: &mut self.atomistic };
        self.signals.emit_export(&mut ctx)?;
        Ok(MigrationParcel { particles, buffer })
    }

    /// `afterMigrate`: installs the arriving particles as reals and lets
    /// every subscribed list consume its wire chunk. A parcel that is not
    /// fully drained afterwards means the two sides disagree about the
    /// subscriber set, which is fatal.
    pub fn migrate_in(&mut self, parcel: MigrationParcel) -> Result<(), Error> {
        let arriving: Vec<ParticleId> = parcel.particles.iter().map(|p| p.id).collect();
        for particle in parcel.particles {
            self.evict_ghost(particle.id);
            self.add_real(particle);
        }
        debug!(rank = self.comm.rank(), arriving = arriving.len(), "import phase");
        let mut reader = parcel.buffer.into_reader();
        let mut ctx = ImportCtx {
            arriving: &arriving,
            reader: &mut reader,
            atomistic: &mut self.atomistic,
        };
        self.signals.emit_import(&mut ctx)?;
        if !ctx.reader.is_drained() {
            return Err(Error::CorruptStream(
                "trailing data after all subscribers consumed their chunks".into(),
            ));
        }
        Ok(())
    }

    /// Replaces this epoch's ghost mirrors wholesale.
    pub fn refresh_ghosts(&mut self, ghosts: Vec<Particle>) {
        let stale: Vec<ParticleId> = self
            .locals
            .iter()
            .filter(|&(_, &slot)| {
                self.slots[slot as usize].as_ref().is_some_and(|s| s.ghost)
            })
            .map(|(&id, _)| id)
            .collect();
        for id in stale {
            if let Some(slot) = self.locals.remove(&id) {
                self.slots[slot as usize] = None;
                self.free.push(slot);
            }
        }
        for ghost in ghosts {
            debug_assert!(!self.locals.contains_key(&ghost.id));
            let id = ghost.id;
            let slot = self.insert_slot(ghost, true);
            self.locals.insert(id, slot);
        }
    }

    /// `afterDecompose`: advances the epoch (invalidating every handle of
    /// the previous one) and rebuilds every subscribed list's working list.
    /// Must run after all of the round's transfers have settled, never
    /// between them.
    pub fn complete_decomposition(&mut self) -> Result<(), Error> {
        self.epoch += 1;
        self.atomistic.set_epoch(self.epoch);
        info!(rank = self.comm.rank(), epoch = self.epoch, "decomposition complete, rebuilding");
        let view =
            HostView { resolver: &*self, comm: self.comm.as_ref(), epoch: self.epoch };
        self.signals.emit_rebuild(&view)
    }
}

impl ParticleResolver for ParticleStore {
    fn lookup_real(&self, id: ParticleId) -> Option<ParticleRef> {
        let slot = *self.reals.get(&id)?;
        Some(ParticleRef::new(Realm::Site, slot, self.epoch))
    }

    fn lookup_local(&self, id: ParticleId) -> Option<ParticleRef> {
        let slot = *self.locals.get(&id)?;
        Some(ParticleRef::new(Realm::Site, slot, self.epoch))
    }

    fn lookup_representative(&self, id: ParticleId) -> Option<ParticleRef> {
        self.atomistic.lookup(id)
    }

    fn position(&self, handle: ParticleRef) -> Option<[f64; 3]> {
        self.get(handle).map(|p| p.position)
    }

    fn displacement(&self, from: [f64; 3], to: [f64; 3]) -> [f64; 3] {
        let mut d = [to[0] - from[0], to[1] - from[1], to[2] - from[2]];
        if let Some(lengths) = self.box_lengths {
            for (di, &l) in d.iter_mut().zip(lengths.iter()) {
                *di -= l * (*di / l).round();
            }
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(reals: &[u64], ghosts: &[u64]) -> ParticleStore {
        let mut store = ParticleStore::solo();
        for &id in reals {
            store.add_real(Particle::new(id, [id as f64, 0.0, 0.0]));
        }
        store.refresh_ghosts(
            ghosts.iter().map(|&id| Particle::new(id, [id as f64, 0.0, 0.0])).collect(),
        );
        store
    }

    #[test]
    fn real_and_local_lookup_roles() {
        let store = store_with(&[1, 2], &[3]);
        assert!(store.lookup_real(ParticleId(1)).is_some());
        assert!(store.lookup_real(ParticleId(3)).is_none()); // ghost is not real
        assert!(store.lookup_local(ParticleId(3)).is_some());
        assert!(store.lookup_local(ParticleId(4)).is_none());
        assert_eq!(store.n_reals(), 2);
        assert_eq!(store.n_ghosts(), 1);
    }

    #[test]
    fn handles_go_stale_at_the_next_epoch() {
        let mut store = store_with(&[1], &[]);
        let handle = store.lookup_real(ParticleId(1)).unwrap();
        assert!(store.get(handle).is_some());
        store.complete_decomposition().unwrap();
        assert!(store.get(handle).is_none());
        // A fresh lookup works again.
        let fresh = store.lookup_real(ParticleId(1)).unwrap();
        assert!(store.get(fresh).is_some());
    }

    #[test]
    fn ghost_refresh_replaces_wholesale() {
        let mut store = store_with(&[1], &[10, 11]);
        store.refresh_ghosts(vec![Particle::new(12u64, [0.0; 3])]);
        assert!(store.lookup_local(ParticleId(10)).is_none());
        assert!(store.lookup_local(ParticleId(12)).is_some());
        assert_eq!(store.n_ghosts(), 1);
    }

    #[test]
    fn departing_unknown_particle_is_an_error() {
        let mut store = store_with(&[1], &[]);
        let err = store.migrate_out(&[ParticleId(9)]).unwrap_err();
        assert_eq!(err, Error::UnknownParticle(ParticleId(9)));
    }

    #[test]
    fn migration_moves_particle_state() {
        let mut a = store_with(&[1, 2], &[]);
        let mut b = store_with(&[], &[]);
        let parcel = a.migrate_out(&[ParticleId(2)]).unwrap();
        assert!(!a.contains_real(ParticleId(2)));
        b.migrate_in(parcel).unwrap();
        assert!(b.contains_real(ParticleId(2)));
    }

    #[test]
    fn arriving_real_replaces_its_ghost_mirror() {
        let mut store = store_with(&[], &[5]);
        let parcel = MigrationParcel {
            particles: vec![Particle::new(5u64, [5.0, 0.0, 0.0])],
            buffer: WireBuffer::new(),
        };
        store.migrate_in(parcel).unwrap();
        assert!(store.contains_real(ParticleId(5)));
        assert_eq!(store.n_ghosts(), 0);
        // The mirror's slot is free again, not leaked.
        store.refresh_ghosts(vec![Particle::new(6u64, [6.0, 0.0, 0.0])]);
        assert_eq!(store.n_ghosts(), 1);
        assert!(store.lookup_local(ParticleId(6)).is_some());
    }

    #[test]
    fn trailing_wire_data_is_fatal() {
        let mut store = store_with(&[], &[]);
        let mut parcel = MigrationParcel::default();
        parcel.buffer.write_ints(&[1, 2, 3]); // nobody subscribed to read this
        let err = store.migrate_in(parcel).unwrap_err();
        assert!(matches!(err, Error::CorruptStream(_)));
    }

    #[test]
    fn periodic_displacement_takes_minimum_image() {
        let store = ParticleStore::solo().with_box([10.0, 10.0, 10.0]);
        let d = store.displacement([9.5, 0.0, 0.0], [0.5, 0.0, 0.0]);
        assert!((d[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn atomistic_store_is_a_separate_realm() {
        let mut store = store_with(&[1], &[]);
        store.add_atomistic(Particle::new(100u64, [0.0; 3]));
        assert!(store.lookup_representative(ParticleId(100)).is_some());
        assert!(store.lookup_local(ParticleId(100)).is_none());
        assert!(store.lookup_representative(ParticleId(1)).is_none());
    }
}
