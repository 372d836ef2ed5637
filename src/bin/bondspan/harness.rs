//! Threaded rank harness: one thread per rank, parcels and ghost snapshots
//! exchanged over channels, sizes reduced over the shared communicator.

use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use anyhow::{Result, anyhow, bail};
use tracing::info;

use bondspan::{
    AngleList, BondList, BondedList, BondedTuple, Collective, DihedralList, MigrationParcel,
    Particle, ParticleId, ParticleResolver, ParticleStore, Payload, RestLengthBondList,
    SharedComm, TagList, TupleIds,
};

use crate::scenario::Scenario;

enum Message {
    Parcel(MigrationParcel),
    Ghosts(Vec<Particle>),
}

struct Mailbox {
    senders: Vec<Sender<Message>>,
    inbox: Receiver<Message>,
}

/// Final sizes of one list on one rank.
pub struct ListReport {
    pub label: &'static str,
    pub local: usize,
    pub resolved: usize,
    pub global: u64,
    pub entries: Vec<String>,
}

pub struct RankReport {
    pub rank: usize,
    pub reals: usize,
    pub ghosts: usize,
    pub lists: Vec<ListReport>,
}

/// Runs the scenario on `scenario.ranks` threads and returns the per-rank
/// reports in rank order.
pub fn run(scenario: &Scenario) -> Result<Vec<RankReport>> {
    let n_ranks = scenario.ranks;
    let comms = SharedComm::create(n_ranks);
    let (senders, inboxes): (Vec<_>, Vec<_>) = (0..n_ranks).map(|_| channel()).unzip();

    let mut handles = Vec::with_capacity(n_ranks);
    for (rank, (comm, inbox)) in comms.into_iter().zip(inboxes).enumerate() {
        let senders = senders.clone();
        let scenario = scenario.clone();
        let handle = thread::Builder::new()
            .name(format!("rank-{rank}"))
            .spawn(move || drive(&scenario, comm, Mailbox { senders, inbox }))?;
        handles.push(handle);
    }

    let mut reports = handles
        .into_iter()
        .map(|h| h.join().map_err(|_| anyhow!("rank thread panicked"))?)
        .collect::<Result<Vec<_>>>()?;
    reports.sort_by_key(|r| r.rank);
    Ok(reports)
}

/// The relationship lists of one rank. Every rank constructs the same lists
/// in the same order: subscription order decides the wire chunk order, and
/// every add/rebuild issues one collective check per list.
struct ChainLists {
    tags: Option<TagList>,
    bonds: Option<BondList>,
    rest_lengths: Option<RestLengthBondList>,
    angles: Option<AngleList>,
    dihedrals: Option<DihedralList>,
}

impl ChainLists {
    fn build(store: &ParticleStore, scenario: &Scenario) -> Self {
        let lists = &scenario.lists;
        Self {
            tags: lists.tags.then(|| TagList::bind(store, "tag")),
            bonds: lists.bonds.then(|| BondList::bind(store, "bond")),
            rest_lengths: lists
                .rest_lengths
                .then(|| RestLengthBondList::bind(store, "bond-rest")),
            angles: lists.angles.then(|| AngleList::bind(store, "angle")),
            dihedrals: lists.dihedrals.then(|| DihedralList::bind(store, "dihedral")),
        }
    }

    /// Issues the same add sequence on every rank; only rank 0 (the initial
    /// owner of the whole chain) actually indexes anything.
    fn populate(&self, store: &ParticleStore, n: u64) -> Result<()> {
        let view = store.view();
        let id = |i: u64| ParticleId(i);
        if let Some(tags) = &self.tags {
            for i in (1..=n).step_by(2) {
                tags.add(&view, &[id(i)])?;
            }
        }
        for i in 1..n {
            if let Some(bonds) = &self.bonds {
                bonds.add(&view, &[id(i), id(i + 1)])?;
            }
            if let Some(rest) = &self.rest_lengths {
                rest.add_measured(&view, id(i), id(i + 1))?;
            }
        }
        if let Some(angles) = &self.angles {
            for i in 1..n.saturating_sub(1) {
                angles.add(&view, &[id(i), id(i + 1), id(i + 2)])?;
            }
        }
        if let Some(dihedrals) = &self.dihedrals {
            for i in 1..n.saturating_sub(2) {
                dihedrals.add(&view, &[id(i), id(i + 1), id(i + 2), id(i + 3)])?;
            }
        }
        Ok(())
    }

    fn report(&self, store: &ParticleStore) -> Vec<ListReport> {
        fn one<T: BondedTuple, P: Payload>(
            label: &'static str,
            list: &BondedList<T, P>,
            store: &ParticleStore,
        ) -> ListReport {
            ListReport {
                label,
                local: list.len(),
                resolved: list.working().len(),
                global: list.total_len(store.comm()),
                entries: list
                    .resolved()
                    .iter()
                    .map(|e| TupleIds::new(e.ids()).to_string())
                    .collect(),
            }
        }

        let mut out = Vec::new();
        if let Some(l) = &self.tags {
            out.push(one("tag", l, store));
        }
        if let Some(l) = &self.bonds {
            out.push(one("bond", l, store));
        }
        if let Some(l) = &self.rest_lengths {
            out.push(one("bond-rest", l, store));
        }
        if let Some(l) = &self.angles {
            out.push(one("angle", l, store));
        }
        if let Some(l) = &self.dihedrals {
            out.push(one("dihedral", l, store));
        }
        out
    }
}

fn drive(scenario: &Scenario, comm: SharedComm, mail: Mailbox) -> Result<RankReport> {
    let rank = comm.rank();
    let n_ranks = comm.n_ranks();
    let mut store = ParticleStore::new(Rc::new(comm));

    let mut owned: Vec<ParticleId> = Vec::new();
    if rank == 0 {
        for i in 1..=scenario.chain.particles {
            let x = i as f64 * scenario.chain.spacing;
            store.add_real(Particle::new(i, [x, 0.0, 0.0]));
            owned.push(ParticleId(i));
        }
    }

    let lists = ChainLists::build(&store, scenario);
    lists.populate(&store, scenario.chain.particles)?;

    // Settle the initial decomposition before any migration.
    communicate(&mut store, &mail, &mut owned, Vec::new())?;

    for round in 1..=scenario.rounds {
        let departing = if rank + 1 < n_ranks {
            owned.sort_unstable();
            owned.split_off(owned.len().saturating_sub(scenario.batch.min(owned.len())))
        } else {
            Vec::new()
        };
        info!(rank, round, departing = departing.len(), "migration round");
        communicate(&mut store, &mail, &mut owned, departing)?;
    }

    Ok(RankReport {
        rank,
        reals: store.n_reals(),
        ghosts: store.n_ghosts(),
        lists: lists.report(&store),
    })
}

/// One communication round: ship the departing particles to the right
/// neighbor, absorb the parcel from the left, mirror every peer's reals as
/// ghosts, then complete the decomposition.
fn communicate(
    store: &mut ParticleStore,
    mail: &Mailbox,
    owned: &mut Vec<ParticleId>,
    departing: Vec<ParticleId>,
) -> Result<()> {
    let rank = store.rank();
    let n_ranks = store.comm().n_ranks();

    // An empty parcel is still sent: the receiver always reads one.
    if rank + 1 < n_ranks {
        let parcel = store.migrate_out(&departing)?;
        mail.senders[rank + 1]
            .send(Message::Parcel(parcel))
            .map_err(|_| anyhow!("rank {} hung up", rank + 1))?;
    }

    let mut ghosts: Vec<Particle> = Vec::new();
    let mut ghost_msgs = 0;
    let mut parcel_pending = rank > 0;
    while parcel_pending {
        match mail.inbox.recv()? {
            Message::Parcel(parcel) => {
                owned.extend(parcel.particles.iter().map(|p| p.id));
                store.migrate_in(parcel)?;
                parcel_pending = false;
            }
            Message::Ghosts(batch) => {
                ghost_msgs += 1;
                ghosts.extend(batch);
            }
        }
    }

    // Reals are final for this round; snapshot them for everyone else.
    let snapshot: Vec<Particle> = owned
        .iter()
        .filter_map(|&id| {
            let handle = store.lookup_real(id)?;
            store.get(handle).cloned()
        })
        .collect();
    for (peer, tx) in mail.senders.iter().enumerate() {
        if peer != rank {
            tx.send(Message::Ghosts(snapshot.clone()))
                .map_err(|_| anyhow!("rank {peer} hung up"))?;
        }
    }
    while ghost_msgs < n_ranks - 1 {
        match mail.inbox.recv()? {
            Message::Ghosts(batch) => {
                ghost_msgs += 1;
                ghosts.extend(batch);
            }
            Message::Parcel(_) => bail!("parcel received outside the migration phase"),
        }
    }

    store.refresh_ghosts(ghosts);
    store.complete_decomposition()?;
    // Round separator: no rank starts the next round's sends before every
    // rank has drained this round's messages.
    store.comm().all_reduce_sum(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_conserves_every_list() {
        let scenario = Scenario::default();
        let reports = run(&scenario).unwrap();
        assert_eq!(reports.len(), 2);

        let reals: usize = reports.iter().map(|r| r.reals).sum();
        assert_eq!(reals as u64, scenario.chain.particles);

        // 8-particle chain: 4 tags, 7 bonds (twice), 6 angles, 5 dihedrals.
        for report in &reports {
            let globals: Vec<u64> = report.lists.iter().map(|l| l.global).collect();
            assert_eq!(globals, vec![4, 7, 7, 6, 5]);
            // Full ghost mirrors: everything local also resolves.
            for list in &report.lists {
                assert_eq!(list.resolved, list.local);
            }
        }
    }

    #[test]
    fn solo_rank_scenario_never_migrates() {
        let scenario = Scenario { ranks: 1, rounds: 2, ..Scenario::default() };
        let reports = run(&scenario).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reals as u64, scenario.chain.particles);
        assert_eq!(reports[0].ghosts, 0);
    }
}
