//! Two-rank integration tests: each rank runs on its own thread with a
//! barrier-backed communicator, parcels crossing over channels.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use bondspan::{
    BondList, Collective, Error, MigrationParcel, Particle, ParticleId, ParticleStore, SharedComm,
};

fn pid(v: u64) -> ParticleId {
    ParticleId(v)
}

/// Runs `body` once per rank on its own thread and returns both results in
/// rank order. The channel pair is a single bidirectional migration edge.
fn run_two<R, F>(body: F) -> (R, R)
where
    R: Send + 'static,
    F: Fn(SharedComm, Sender<MigrationParcel>, Receiver<MigrationParcel>) -> R
        + Send
        + Sync
        + 'static,
{
    let mut comms = SharedComm::create(2);
    let comm1 = comms.pop().unwrap();
    let comm0 = comms.pop().unwrap();
    let (to_1, from_0) = channel();
    let (to_0, from_1) = channel();

    let body = Arc::new(body);
    let body0 = Arc::clone(&body);
    let rank0 = thread::spawn(move || body0(comm0, to_1, from_1));
    let rank1 = thread::spawn(move || body(comm1, to_0, from_0));
    (rank0.join().unwrap(), rank1.join().unwrap())
}

/// Rank 0 owns 5 and mirrors 9; rank 1 owns 9 and mirrors 5.
fn edge_store(comm: SharedComm) -> ParticleStore {
    let rank = comm.rank();
    let mut store = ParticleStore::new(Rc::new(comm));
    let five = Particle::new(5u64, [5.0, 0.0, 0.0]);
    let nine = Particle::new(9u64, [9.0, 0.0, 0.0]);
    if rank == 0 {
        store.add_real(five);
        store.refresh_ghosts(vec![nine]);
    } else {
        store.add_real(nine);
        store.refresh_ghosts(vec![five]);
    }
    store
}

#[test]
fn migrating_key_moves_the_bond_to_the_receiver() {
    let (a, b) = run_two(|comm, tx, rx| {
        let rank = comm.rank();
        let mut store = edge_store(comm);
        let bonds = BondList::bind(&store, "bond");

        // Both ranks issue the add; only the owner of key 5 indexes it.
        let added = bonds.add(&store.view(), &[pid(5), pid(9)]).unwrap();
        assert_eq!(added, rank == 0);

        // Particle 5 crosses from rank 0 to rank 1.
        if rank == 0 {
            let parcel = store.migrate_out(&[pid(5)]).unwrap();
            tx.send(parcel).unwrap();
            store.refresh_ghosts(vec![
                Particle::new(5u64, [5.0, 0.0, 0.0]),
                Particle::new(9u64, [9.0, 0.0, 0.0]),
            ]);
        } else {
            // 5 is still mirrored here when it arrives; the real replaces
            // the stale mirror.
            let parcel = rx.recv().unwrap();
            store.migrate_in(parcel).unwrap();
        }
        store.complete_decomposition().unwrap();

        let global = bonds.total_len(store.comm());
        (bonds.len(), bonds.working().len(), global)
    });

    assert_eq!(a, (0, 0, 1));
    assert_eq!(b, (1, 1, 1));
}

#[test]
fn clearing_every_rank_reduces_the_global_size_to_zero() {
    let (a, b) = run_two(|comm, _tx, _rx| {
        let store = edge_store(comm);
        let bonds = BondList::bind(&store, "bond");
        bonds.add(&store.view(), &[pid(5), pid(9)]).unwrap();

        let before = bonds.total_len(store.comm());
        bonds.clear();
        let after = bonds.total_len(store.comm());
        (before, after)
    });

    assert_eq!(a, (1, 0));
    assert_eq!(b, (1, 0));
}

#[test]
fn unreachable_partner_fails_both_ranks() {
    let (a, b) = run_two(|comm, _tx, _rx| {
        let store = edge_store(comm);
        let bonds = BondList::bind(&store, "bond");
        // 99 is neither real nor mirrored anywhere.
        bonds.add(&store.view(), &[pid(5), pid(99)]).unwrap_err()
    });

    // The owner of key 5 detected it; the other rank fails with it.
    assert!(matches!(a, Error::ResolutionFailures { global: 1, local: 1, rank: 0, .. }));
    assert!(matches!(b, Error::ResolutionFailures { global: 1, local: 0, rank: 1, .. }));
}

#[test]
fn global_size_sums_local_contributions() {
    let (a, b) = run_two(|comm, _tx, _rx| {
        let rank = comm.rank();
        let mut store = ParticleStore::new(Rc::new(comm));
        // Each rank owns its own short chain.
        let base = rank as u64 * 10 + 1;
        for i in base..base + 3 {
            store.add_real(Particle::new(i, [i as f64, 0.0, 0.0]));
        }
        let bonds = BondList::bind(&store, "bond");
        for i in base..base + 2 {
            bonds.add(&store.view(), &[pid(i), pid(i + 1)]).unwrap();
        }
        // The other rank's adds also reach this rank's collective check.
        let other = if rank == 0 { 11 } else { 1 };
        for i in other..other + 2 {
            assert!(!bonds.add(&store.view(), &[pid(i), pid(i + 1)]).unwrap());
        }
        bonds.total_len(store.comm())
    });

    assert_eq!(a, 4);
    assert_eq!(b, 4);
}

#[test]
fn rebuild_failure_is_collective() {
    let (a, b) = run_two(|comm, _tx, _rx| {
        let mut store = edge_store(comm);
        let bonds = BondList::bind(&store, "bond");
        bonds.add(&store.view(), &[pid(5), pid(9)]).unwrap();

        // Next round no rank mirrors its neighbor: the bond now spans
        // farther than the communication range, and the owner's rebuild
        // failure takes the other rank down with it.
        store.refresh_ghosts(Vec::new());
        store.complete_decomposition().unwrap_err()
    });

    assert!(matches!(a, Error::ResolutionFailures { global: 1, local: 1, rank: 0, .. }));
    assert!(matches!(b, Error::ResolutionFailures { global: 1, local: 0, rank: 1, .. }));
}
