//! Atomistic-representative resolution mode.
//!
//! In this mode bonded relationships are defined over *atomistic
//! representatives* of coarse-grained virtual sites, while the spatial
//! decomposition only ever moves the virtual sites. The
//! [`RepresentativeMap`] is the bridge: it records which representatives
//! belong to which site, ships the representatives (state included) whenever
//! their site departs, and relays a private migration lifecycle to the
//! atomistic bonded lists subscribed to it. Those lists never wire the
//! ordinary particle-level hooks, so nothing is bookkept twice.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::host::collective::{Collective, ErrorHoard};
use crate::host::resolver::HostView;
use crate::host::signals::{ExportCtx, ImportCtx, MigrationHooks, MigrationSignals, Subscription};
use crate::host::storage::ParticleStore;
use crate::host::wire::wire_id;
use crate::model::{Particle, ParticleId, ParticleRef, TupleIds};

use super::error::Error;

const LIST: &str = "representative-map";

/// One resolved virtual-site group for the current epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    pub site_id: ParticleId,
    pub site: ParticleRef,
    pub members: Vec<(ParticleId, ParticleRef)>,
}

struct RepCore {
    groups: BTreeMap<ParticleId, Vec<ParticleId>>,
    resolved: Vec<ResolvedGroup>,
    relay: Rc<MigrationSignals>,
}

impl RepCore {
    fn add(
        &mut self,
        host: &HostView<'_>,
        site: ParticleId,
        members: &[ParticleId],
    ) -> Result<bool, Error> {
        let mut hoard = ErrorHoard::new(host.comm);
        let owned = host.resolver.lookup_real(site).is_some();
        if owned {
            for &member in members {
                if host.resolver.lookup_representative(member).is_none() {
                    hoard.record(Error::PartnerUnreachable {
                        list: LIST,
                        tuple: TupleIds::new(&[site]),
                        partner: member,
                    });
                }
            }
        }
        hoard.check()?;

        if !owned {
            return Ok(false);
        }
        if self.groups.contains_key(&site) {
            return Err(Error::Duplicate { list: LIST, tuple: TupleIds::new(&[site]) });
        }
        self.groups.insert(site, members.to_vec());
        debug!(site = %site, members = members.len(), "representative group added");
        Ok(true)
    }
}

impl MigrationHooks for RepCore {
    fn export_departing(&mut self, ctx: &mut ExportCtx<'_>) -> Result<(), Error> {
        let mut ints: Vec<i64> = Vec::new();
        let mut reals: Vec<f64> = Vec::new();
        let mut exported: Vec<ParticleId> = Vec::new();
        for &site in ctx.departing {
            let Some(members) = self.groups.remove(&site) else {
                continue;
            };
            debug!(site = %site, members = members.len(), "exporting representative group");
            ints.push(site.0 as i64);
            ints.push(members.len() as i64);
            for member in members {
                // The representative's state ships with its site; it exists
                // nowhere until the matching import restores it.
                let particle =
                    ctx.atomistic.remove(member).ok_or(Error::UnknownParticle(member))?;
                ints.push(member.0 as i64);
                reals.extend_from_slice(&particle.position);
                exported.push(member);
            }
        }
        ctx.buf.write_ints(&ints);
        ctx.buf.write_reals(&reals);

        // The atomistic lists key their export off the representative ids,
        // not off the generic departing-particle list.
        let mut sub = ExportCtx {
            departing: &exported,
            buf: &mut *ctx.buf,
            atomistic: &mut *ctx.atomistic,
        };
        self.relay.emit_export(&mut sub)
    }

    fn import_arriving(&mut self, ctx: &mut ImportCtx<'_>) -> Result<(), Error> {
        let ints = ctx.reader.read_ints()?;
        let reals = ctx.reader.read_reals()?;
        let mut arrived: Vec<ParticleId> = Vec::new();
        let mut i = 0;
        let mut r = 0;
        while i < ints.len() {
            if i + 2 > ints.len() {
                return Err(Error::CorruptStream(format!("{LIST}: truncated group header")));
            }
            let site = wire_id(ints[i])?;
            let count = usize::try_from(ints[i + 1]).map_err(|_| {
                Error::CorruptStream(format!("{LIST}: negative member count"))
            })?;
            i += 2;
            let mut members = Vec::with_capacity(count);
            for _ in 0..count {
                if i >= ints.len() {
                    return Err(Error::CorruptStream(format!(
                        "{LIST}: member ids overrun the stream"
                    )));
                }
                let member = wire_id(ints[i])?;
                i += 1;
                let position = reals.get(r..r + 3).ok_or_else(|| {
                    Error::CorruptStream(format!("{LIST}: member state overruns the stream"))
                })?;
                r += 3;
                ctx.atomistic.insert(Particle {
                    id: member,
                    position: [position[0], position[1], position[2]],
                });
                members.push(member);
                arrived.push(member);
            }
            if self.groups.contains_key(&site) {
                return Err(Error::Duplicate { list: LIST, tuple: TupleIds::new(&[site]) });
            }
            debug!(site = %site, members = members.len(), "imported representative group");
            self.groups.insert(site, members);
        }
        if r != reals.len() {
            return Err(Error::CorruptStream(format!(
                "{LIST}: {} unread member reals",
                reals.len() - r
            )));
        }

        let mut sub = ImportCtx {
            arriving: &arrived,
            reader: &mut *ctx.reader,
            atomistic: &mut *ctx.atomistic,
        };
        self.relay.emit_import(&mut sub)
    }

    fn rebuild_local(&mut self, host: &HostView<'_>) -> Result<(), Error> {
        let mut hoard = ErrorHoard::new(host.comm);
        let mut resolved = Vec::with_capacity(self.groups.len());
        for (&site_id, members) in &self.groups {
            let Some(site) = host.resolver.lookup_real(site_id) else {
                hoard.record(Error::KeyUnresolved {
                    list: LIST,
                    tuple: TupleIds::new(&[site_id]),
                    key: site_id,
                });
                continue;
            };
            let mut group =
                ResolvedGroup { site_id, site, members: Vec::with_capacity(members.len()) };
            let mut complete = true;
            for &member in members {
                match host.resolver.lookup_representative(member) {
                    Some(handle) => group.members.push((member, handle)),
                    None => {
                        hoard.record(Error::PartnerOutOfRange {
                            list: LIST,
                            tuple: TupleIds::new(&[site_id]),
                            partner: member,
                        });
                        complete = false;
                    }
                }
            }
            if complete {
                resolved.push(group);
            }
        }
        hoard.check()?;
        info!(epoch = host.epoch, groups = resolved.len(), "representative map rebuilt");
        self.resolved = resolved;
        self.relay.emit_rebuild(host)
    }
}

/// The auxiliary mapping from a coarse-grained virtual site to its
/// underlying atomistic representatives.
///
/// Owns the relayed migration lifecycle that atomistic bonded lists
/// subscribe to via
/// [`BondedList::bind_atomistic`](super::list::BondedList::bind_atomistic).
pub struct RepresentativeMap {
    core: Rc<RefCell<RepCore>>,
    relay: Rc<MigrationSignals>,
    _subscription: Subscription,
}

impl RepresentativeMap {
    pub fn bind(store: &ParticleStore) -> Self {
        let relay = Rc::new(MigrationSignals::new());
        let core = Rc::new(RefCell::new(RepCore {
            groups: BTreeMap::new(),
            resolved: Vec::new(),
            relay: Rc::clone(&relay),
        }));
        let weak = Rc::downgrade(&core) as Weak<RefCell<dyn MigrationHooks>>;
        let subscription = store.signals().subscribe(weak);
        info!("representative map bound");
        Self { core, relay, _subscription: subscription }
    }

    /// The relayed lifecycle hub for atomistic bonded lists.
    pub fn relay(&self) -> &MigrationSignals {
        &self.relay
    }

    /// Registers a virtual site's representative group. Returns `Ok(true)`
    /// on the rank owning the site, `Ok(false)` elsewhere; a second group
    /// for the same site is rejected.
    pub fn add(
        &self,
        host: &HostView<'_>,
        site: ParticleId,
        members: &[ParticleId],
    ) -> Result<bool, Error> {
        self.core.borrow_mut().add(host, site, members)
    }

    /// The representative ids of one site's group, if indexed here.
    pub fn group(&self, site: ParticleId) -> Option<Vec<ParticleId>> {
        self.core.borrow().groups.get(&site).cloned()
    }

    /// Number of groups indexed on this rank.
    pub fn len(&self) -> usize {
        self.core.borrow().groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global group count, reduced over every rank.
    pub fn total_len(&self, comm: &dyn Collective) -> u64 {
        comm.all_reduce_sum(self.len() as u64)
    }

    /// The resolved groups of the current epoch.
    pub fn resolved(&self) -> Vec<ResolvedGroup> {
        self.core.borrow().resolved.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::list::BondedList;
    use crate::model::Pair;

    fn pid(v: u64) -> ParticleId {
        ParticleId(v)
    }

    /// A rank owning virtual site `site` with representatives `members`.
    fn site_store(site: u64, members: &[u64]) -> ParticleStore {
        let mut store = ParticleStore::solo();
        store.add_real(Particle::new(site, [site as f64, 0.0, 0.0]));
        for &m in members {
            store.add_atomistic(Particle::new(m, [m as f64 * 0.1, 0.0, 0.0]));
        }
        store
    }

    #[test]
    fn group_resolves_after_rebuild() {
        let mut store = site_store(1, &[101, 102]);
        let map = RepresentativeMap::bind(&store);
        assert!(map.add(&store.view(), pid(1), &[pid(101), pid(102)]).unwrap());
        store.complete_decomposition().unwrap();

        let groups = map.resolved();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].site_id, pid(1));
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn add_on_non_owner_rank_is_a_clean_no() {
        let store = ParticleStore::solo();
        let map = RepresentativeMap::bind(&store);
        assert!(!map.add(&store.view(), pid(1), &[pid(101)]).unwrap());
        assert!(map.is_empty());
    }

    #[test]
    fn unknown_member_fails_loudly() {
        let store = site_store(1, &[101]);
        let map = RepresentativeMap::bind(&store);
        let err = map.add(&store.view(), pid(1), &[pid(101), pid(999)]).unwrap_err();
        assert!(matches!(err, Error::ResolutionFailures { .. }));
    }

    #[test]
    fn representatives_ride_along_with_their_site() {
        let mut a = site_store(1, &[101, 102]);
        let map_a = RepresentativeMap::bind(&a);
        map_a.add(&a.view(), pid(1), &[pid(101), pid(102)]).unwrap();

        let mut b = ParticleStore::solo();
        let map_b = RepresentativeMap::bind(&b);

        let parcel = a.migrate_out(&[pid(1)]).unwrap();
        assert!(a.atomistic().is_empty()); // state shipped, not copied
        assert_eq!(map_a.len(), 0);

        b.migrate_in(parcel).unwrap();
        assert_eq!(map_b.group(pid(1)), Some(vec![pid(101), pid(102)]));
        assert_eq!(b.atomistic().len(), 2);

        b.complete_decomposition().unwrap();
        assert_eq!(map_b.resolved().len(), 1);
    }

    #[test]
    fn atomistic_bonds_follow_the_virtual_site() {
        let mut a = site_store(1, &[101, 102]);
        let map_a = RepresentativeMap::bind(&a);
        let bonds_a: BondedList<Pair, ()> = BondedList::bind_atomistic(&map_a, "at-bond");
        map_a.add(&a.view(), pid(1), &[pid(101), pid(102)]).unwrap();
        assert!(bonds_a.add(&a.view(), &[pid(101), pid(102)]).unwrap());

        let mut b = ParticleStore::solo();
        let map_b = RepresentativeMap::bind(&b);
        let bonds_b: BondedList<Pair, ()> = BondedList::bind_atomistic(&map_b, "at-bond");

        let parcel = a.migrate_out(&[pid(1)]).unwrap();
        assert_eq!(bonds_a.len(), 0);
        b.migrate_in(parcel).unwrap();
        assert_eq!(bonds_b.len(), 1);

        b.complete_decomposition().unwrap();
        let working = bonds_b.working();
        assert_eq!(working.len(), 1);
        assert_eq!(working.as_slice()[0].ids(), &[pid(101), pid(102)]);
    }

    #[test]
    fn resolved_member_handles_go_stale_at_the_next_epoch() {
        let mut store = site_store(1, &[101]);
        let map = RepresentativeMap::bind(&store);
        map.add(&store.view(), pid(1), &[pid(101)]).unwrap();
        store.complete_decomposition().unwrap();

        let handle = map.resolved()[0].members[0].1;
        assert!(store.get(handle).is_some());
        store.complete_decomposition().unwrap();
        assert!(store.get(handle).is_none());
    }
}
