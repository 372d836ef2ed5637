//! The per-kind bonded relationship list: authoritative index, migration
//! hooks, and resolved working list in one rank-local unit.

use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::host::collective::{Collective, ErrorHoard};
use crate::host::resolver::HostView;
use crate::host::signals::{ExportCtx, ImportCtx, MigrationHooks, MigrationSignals, Subscription};
use crate::host::storage::ParticleStore;
use crate::host::wire::wire_id;
use crate::model::{
    BondedTuple, MAX_ARITY, Pair, ParticleId, ParticleRef, Payload, Quadruple, Realm, Single,
    Triple, TupleIds, geometry,
};

use super::adress::RepresentativeMap;
use super::error::Error;
use super::index::TopologyIndex;
use super::working::{ResolvedTuple, WorkingList};

/// Which lookup services resolve this list's participants.
///
/// Plain lists resolve their key through the "real" lookup and partners
/// through the "local" (real-or-ghost) lookup. Atomistic lists resolve every
/// participant through the representative lookup, because their particles
/// ride along with a coarse-grained virtual site instead of taking part in
/// the decomposition themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Site,
    Representative,
}

impl Binding {
    fn lookup_key(&self, host: &HostView<'_>, id: ParticleId) -> Option<ParticleRef> {
        match self {
            Binding::Site => host.resolver.lookup_real(id),
            Binding::Representative => host.resolver.lookup_representative(id),
        }
    }

    fn lookup_partner(&self, host: &HostView<'_>, id: ParticleId) -> Option<ParticleRef> {
        match self {
            Binding::Site => host.resolver.lookup_local(id),
            Binding::Representative => host.resolver.lookup_representative(id),
        }
    }
}

pub(crate) struct ListCore<T: BondedTuple, P: Payload> {
    label: &'static str,
    binding: Binding,
    index: TopologyIndex<T, P>,
    working: WorkingList,
}

impl<T: BondedTuple, P: Payload> ListCore<T, P> {
    fn new(label: &'static str, binding: Binding) -> Self {
        Self { label, binding, index: TopologyIndex::new(label), working: WorkingList::default() }
    }

    fn add(&mut self, host: &HostView<'_>, ids: &[ParticleId], payload: P) -> Result<bool, Error> {
        if ids.len() != T::ARITY {
            return Err(Error::Arity {
                list: self.label,
                kind: T::KIND,
                expected: T::ARITY,
                got: ids.len(),
            });
        }
        let tuple = T::from_ids(ids);

        // Every rank on which the key might be real issues this call; only
        // the owner's succeeds. An unreachable partner on the owner is a
        // topology/geometry inconsistency, raised collectively so all ranks
        // abort together.
        let mut hoard = ErrorHoard::new(host.comm);
        let key_ref = self.binding.lookup_key(host, tuple.key());
        if key_ref.is_some() {
            for partner in tuple.partners().iter() {
                if self.binding.lookup_partner(host, partner).is_none() {
                    hoard.record(Error::PartnerUnreachable {
                        list: self.label,
                        tuple: tuple.ordered(),
                        partner,
                    });
                }
            }
        }
        hoard.check()?;

        if key_ref.is_none() {
            return Ok(false);
        }
        self.index.insert(tuple, payload)?;
        debug!(list = self.label, tuple = %tuple.ordered(), "relationship added");
        Ok(true)
    }

    /// Positions of all participants in geometric order, through this list's
    /// binding; `None` when the key is not real here (the add will return
    /// `Ok(false)` anyway) or a partner is unreachable (the add will fail
    /// collectively).
    fn measure_positions(
        &self,
        host: &HostView<'_>,
        tuple: &T,
    ) -> Option<[[f64; 3]; MAX_ARITY]> {
        let mut out = [[0.0; 3]; MAX_ARITY];
        let key = tuple.key();
        for (i, id) in tuple.ordered().iter().enumerate() {
            let handle = if id == key {
                self.binding.lookup_key(host, id)?
            } else {
                self.binding.lookup_partner(host, id)?
            };
            out[i] = host.resolver.position(handle)?;
        }
        Some(out)
    }
}

impl<T: BondedTuple, P: Payload> MigrationHooks for ListCore<T, P> {
    fn export_departing(&mut self, ctx: &mut ExportCtx<'_>) -> Result<(), Error> {
        let mut ints: Vec<i64> = Vec::new();
        let mut reals: Vec<f64> = Vec::new();
        for &pid in ctx.departing {
            let Some(records) = self.index.remove_key(pid) else {
                continue;
            };
            debug!(list = self.label, key = %pid, n = records.len(), "exporting relationships");
            ints.reserve(records.len() * T::ARITY + 2);
            ints.push(pid.0 as i64);
            ints.push(records.len() as i64);
            for (tuple, payload) in records {
                for partner in tuple.partners().iter() {
                    ints.push(partner.0 as i64);
                }
                payload.write(&mut reals);
            }
        }
        // Chunks are written even when empty; the matching import always
        // reads one chunk of each stream.
        ctx.buf.write_ints(&ints);
        ctx.buf.write_reals(&reals);
        Ok(())
    }

    fn import_arriving(&mut self, ctx: &mut ImportCtx<'_>) -> Result<(), Error> {
        let ints = ctx.reader.read_ints()?;
        let reals = ctx.reader.read_reals()?;
        let n_partners = T::ARITY - 1;
        let mut i = 0;
        let mut real_pos = 0;
        while i < ints.len() {
            if i + 2 > ints.len() {
                return Err(Error::CorruptStream(format!(
                    "{}: truncated record header",
                    self.label
                )));
            }
            let key = wire_id(ints[i])?;
            let count = usize::try_from(ints[i + 1]).map_err(|_| {
                Error::CorruptStream(format!("{}: negative partner count", self.label))
            })?;
            i += 2;
            for _ in 0..count {
                if i + n_partners > ints.len() {
                    return Err(Error::CorruptStream(format!(
                        "{}: partner ids overrun the stream",
                        self.label
                    )));
                }
                let mut partners = [ParticleId(0); MAX_ARITY];
                for (j, slot) in partners[..n_partners].iter_mut().enumerate() {
                    *slot = wire_id(ints[i + j])?;
                }
                i += n_partners;
                let payload = P::read(&reals, &mut real_pos).ok_or_else(|| {
                    Error::CorruptStream(format!("{}: payload overruns the stream", self.label))
                })?;
                // No resolvability check: the key is trusted to have just
                // arrived. A tuple already present here means two ranks held
                // the same relationship, which must never happen.
                let tuple = T::from_key_partners(key, &partners[..n_partners]);
                self.index.insert(tuple, payload)?;
            }
            debug!(list = self.label, key = %key, n = count, "imported relationships");
        }
        if real_pos != reals.len() {
            return Err(Error::CorruptStream(format!(
                "{}: {} unread payload reals",
                self.label,
                reals.len() - real_pos
            )));
        }
        Ok(())
    }

    fn rebuild_local(&mut self, host: &HostView<'_>) -> Result<(), Error> {
        let mut hoard = ErrorHoard::new(host.comm);
        let mut fresh = WorkingList::new(host.epoch);
        for (key, records) in self.index.iter_keys() {
            let key_ref = self.binding.lookup_key(host, key);
            for (tuple, _) in records {
                let Some(key_ref) = key_ref else {
                    hoard.record(Error::KeyUnresolved {
                        list: self.label,
                        tuple: tuple.ordered(),
                        key,
                    });
                    continue;
                };
                let ordered = tuple.ordered();
                let mut refs = [ParticleRef::new(Realm::Site, 0, 0); MAX_ARITY];
                let mut complete = true;
                for (i, id) in ordered.iter().enumerate() {
                    let handle = if id == key {
                        Some(key_ref)
                    } else {
                        self.binding.lookup_partner(host, id)
                    };
                    match handle {
                        Some(h) => refs[i] = h,
                        None => {
                            hoard.record(Error::PartnerOutOfRange {
                                list: self.label,
                                tuple: ordered,
                                partner: id,
                            });
                            complete = false;
                        }
                    }
                }
                if complete {
                    fresh.push(ResolvedTuple::new(ordered, &refs[..ordered.len()]));
                }
            }
        }
        hoard.check()?;
        info!(
            list = self.label,
            epoch = host.epoch,
            entries = fresh.len(),
            "working list rebuilt"
        );
        self.working = fresh;
        Ok(())
    }
}

/// A distributed bonded-relationship list of one kind (tag, bond, angle,
/// dihedral), with or without a frozen payload.
///
/// Construction subscribes the list to the host's migration lifecycle;
/// dropping it unsubscribes. Between communication rounds the list is
/// mutated only through [`add`](Self::add)/[`remove`](Self::remove) calls
/// issued by setup code or reactive extensions.
pub struct BondedList<T: BondedTuple, P: Payload = ()> {
    core: Rc<RefCell<ListCore<T, P>>>,
    _subscription: Subscription,
}

impl<T: BondedTuple, P: Payload> BondedList<T, P> {
    /// Binds a particle-level list to the store's migration lifecycle.
    pub fn bind(store: &ParticleStore, label: &'static str) -> Self {
        Self::with_binding(store.signals(), Binding::Site, label)
    }

    /// Binds an atomistic-representative list to a representative map's
    /// relayed lifecycle. The ordinary particle-level hooks are never wired
    /// for such a list, so nothing is bookkept twice.
    pub fn bind_atomistic(map: &RepresentativeMap, label: &'static str) -> Self {
        Self::with_binding(map.relay(), Binding::Representative, label)
    }

    fn with_binding(signals: &MigrationSignals, binding: Binding, label: &'static str) -> Self {
        let core = Rc::new(RefCell::new(ListCore::<T, P>::new(label, binding)));
        let weak =
            Rc::downgrade(&core) as Weak<RefCell<dyn MigrationHooks>>;
        let subscription = signals.subscribe(weak);
        info!(list = label, kind = T::KIND, "bonded list bound");
        Self { core, _subscription: subscription }
    }

    /// Adds a relationship with an explicit frozen payload.
    ///
    /// Returns `Ok(true)` on the rank owning the key participant,
    /// `Ok(false)` (no side effects) elsewhere. Duplicates — including
    /// symmetric reorderings — are rejected with [`Error::Duplicate`].
    pub fn add_with(
        &self,
        host: &HostView<'_>,
        ids: &[ParticleId],
        payload: P,
    ) -> Result<bool, Error> {
        self.core.borrow_mut().add(host, ids, payload)
    }

    /// Removes a relationship given in any symmetric order; `true` if it was
    /// present on this rank.
    pub fn remove(&self, ids: &[ParticleId]) -> Result<bool, Error> {
        let mut core = self.core.borrow_mut();
        if ids.len() != T::ARITY {
            return Err(Error::Arity {
                list: core.label,
                kind: T::KIND,
                expected: T::ARITY,
                got: ids.len(),
            });
        }
        let tuple = T::from_ids(ids);
        Ok(core.index.remove(&tuple).is_some())
    }

    pub fn clear(&self) {
        self.core.borrow_mut().index.clear();
    }

    /// Local relationship count.
    pub fn len(&self) -> usize {
        self.core.borrow().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global relationship count, reduced over every rank. Collective: all
    /// ranks must call it together.
    pub fn total_len(&self, comm: &dyn Collective) -> u64 {
        comm.all_reduce_sum(self.len() as u64)
    }

    /// Number of relationships keyed by `key` on this rank.
    pub fn count(&self, key: ParticleId) -> usize {
        self.core.borrow().index.count(key)
    }

    pub fn contains(&self, ids: &[ParticleId]) -> bool {
        if ids.len() != T::ARITY {
            return false;
        }
        self.core.borrow().index.contains(&T::from_ids(ids))
    }

    /// The frozen payload of one relationship, if indexed here.
    pub fn payload(&self, ids: &[ParticleId]) -> Option<P> {
        if ids.len() != T::ARITY {
            return None;
        }
        self.core.borrow().index.payload(&T::from_ids(ids)).copied()
    }

    /// Participant id tuples of every relationship indexed on this rank, in
    /// deterministic order; used for checkpointing and introspection.
    pub fn enumerate(&self) -> Vec<TupleIds> {
        self.core.borrow().index.enumerate()
    }

    /// The resolved working list of the current epoch. Borrowed and
    /// read-only; entries are invalidated by the next rebuild.
    pub fn working(&self) -> Ref<'_, WorkingList> {
        Ref::map(self.core.borrow(), |core| &core.working)
    }

    /// A snapshot of the resolved entries (they are small `Copy` values).
    pub fn resolved(&self) -> Vec<ResolvedTuple> {
        self.core.borrow().working.as_slice().to_vec()
    }
}

impl<T: BondedTuple> BondedList<T, ()> {
    /// Adds a payload-free relationship.
    pub fn add(&self, host: &HostView<'_>, ids: &[ParticleId]) -> Result<bool, Error> {
        self.add_with(host, ids, ())
    }
}

impl BondedList<Pair, f64> {
    /// Adds a pair whose rest length is measured from the current positions
    /// and frozen.
    pub fn add_measured(
        &self,
        host: &HostView<'_>,
        a: ParticleId,
        b: ParticleId,
    ) -> Result<bool, Error> {
        let ids = [a, b];
        let tuple = Pair::from_ids(&ids);
        let rest = self
            .core
            .borrow()
            .measure_positions(host, &tuple)
            .map(|pos| geometry::norm(host.resolver.displacement(pos[0], pos[1])))
            .unwrap_or(0.0);
        self.add_with(host, &ids, rest)
    }
}

impl BondedList<Triple, f64> {
    /// Adds a triple whose rest bending angle (at the middle particle) is
    /// measured from the current positions and frozen.
    pub fn add_measured(
        &self,
        host: &HostView<'_>,
        a: ParticleId,
        b: ParticleId,
        c: ParticleId,
    ) -> Result<bool, Error> {
        let ids = [a, b, c];
        let tuple = Triple::from_ids(&ids);
        let rest = self
            .core
            .borrow()
            .measure_positions(host, &tuple)
            .map(|pos| {
                let r_ij = host.resolver.displacement(pos[1], pos[0]);
                let r_kj = host.resolver.displacement(pos[1], pos[2]);
                geometry::bend_angle(r_ij, r_kj)
            })
            .unwrap_or(0.0);
        self.add_with(host, &ids, rest)
    }
}

impl BondedList<Quadruple, f64> {
    /// Adds a quadruple whose rest dihedral angle is measured from the
    /// current positions and frozen.
    pub fn add_measured(
        &self,
        host: &HostView<'_>,
        a: ParticleId,
        b: ParticleId,
        c: ParticleId,
        d: ParticleId,
    ) -> Result<bool, Error> {
        let ids = [a, b, c, d];
        let tuple = Quadruple::from_ids(&ids);
        let rest = self
            .core
            .borrow()
            .measure_positions(host, &tuple)
            .map(|pos| {
                let b1 = host.resolver.displacement(pos[0], pos[1]);
                let b2 = host.resolver.displacement(pos[1], pos[2]);
                let b3 = host.resolver.displacement(pos[2], pos[3]);
                geometry::dihedral_angle(b1, b2, b3)
            })
            .unwrap_or(0.0);
        self.add_with(host, &ids, rest)
    }
}

/// Singleton group memberships (tagged subsets).
pub type TagList = BondedList<Single, ()>;
/// Bond pairs without payload.
pub type BondList = BondedList<Pair, ()>;
/// Bond pairs carrying a rest length frozen at creation.
pub type RestLengthBondList = BondedList<Pair, f64>;
/// Angle triples without payload.
pub type AngleList = BondedList<Triple, ()>;
/// Angle triples carrying a rest bending angle frozen at creation.
pub type RestAngleList = BondedList<Triple, f64>;
/// Dihedral quadruples without payload.
pub type DihedralList = BondedList<Quadruple, ()>;
/// Dihedral quadruples carrying a rest dihedral angle frozen at creation.
pub type RestDihedralList = BondedList<Quadruple, f64>;
