//! The collective-operation seam and the per-rank error hoard.
//!
//! Parallelism is exclusively across ranks; this crate never schedules
//! communication of its own. The only collective it relies on is a summing
//! all-reduce, used for global size queries and for the joint failure check
//! that lets every rank abort together instead of deadlocking a later
//! collective.

use std::sync::{Arc, Barrier, Mutex};

use tracing::warn;

use crate::topology::Error;

/// Minimal view of the host's communicator.
pub trait Collective {
    fn rank(&self) -> usize;
    fn n_ranks(&self) -> usize;

    /// Sums `value` over every rank; every rank receives the total. All
    /// ranks must call this the same number of times in the same order.
    fn all_reduce_sum(&self, value: u64) -> u64;
}

/// The trivial single-rank communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoloComm;

impl Collective for SoloComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, value: u64) -> u64 {
        value
    }
}

#[derive(Debug)]
struct SharedCommState {
    n_ranks: usize,
    barrier: Barrier,
    accumulator: Mutex<u64>,
}

/// A communicator for in-process rank harnesses: each rank runs on its own
/// thread and the reduction is a two-phase barrier over a shared
/// accumulator. Stands in for the host's MPI-style communicator in tests and
/// in the demo binary.
#[derive(Debug, Clone)]
pub struct SharedComm {
    rank: usize,
    state: Arc<SharedCommState>,
}

impl SharedComm {
    /// Creates one communicator handle per rank. Each handle must be moved
    /// onto the thread driving that rank.
    pub fn create(n_ranks: usize) -> Vec<SharedComm> {
        assert!(n_ranks > 0);
        let state = Arc::new(SharedCommState {
            n_ranks,
            barrier: Barrier::new(n_ranks),
            accumulator: Mutex::new(0),
        });
        (0..n_ranks)
            .map(|rank| SharedComm { rank, state: Arc::clone(&state) })
            .collect()
    }
}

impl Collective for SharedComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_ranks(&self) -> usize {
        self.state.n_ranks
    }

    fn all_reduce_sum(&self, value: u64) -> u64 {
        {
            let mut acc = self.state.accumulator.lock().unwrap();
            *acc += value;
        }
        // Everyone has contributed.
        self.state.barrier.wait();
        let total = *self.state.accumulator.lock().unwrap();
        if self.state.barrier.wait().is_leader() {
            *self.state.accumulator.lock().unwrap() = 0;
        }
        // The accumulator is reset before any rank starts the next round.
        self.state.barrier.wait();
        total
    }
}

/// Collects a rank's resolution failures so that all ranks can fail
/// together.
///
/// Participant-resolution failures during `add` or a rebuild are recorded
/// here instead of being raised immediately; [`ErrorHoard::check`] then
/// all-reduces the failure count and raises one process-wide error on every
/// rank when any rank failed. A rank that aborted alone would leave its
/// peers blocked in the next collective operation.
pub struct ErrorHoard<'a> {
    comm: &'a dyn Collective,
    local: Vec<Error>,
}

impl<'a> ErrorHoard<'a> {
    pub fn new(comm: &'a dyn Collective) -> Self {
        Self { comm, local: Vec::new() }
    }

    pub fn record(&mut self, error: Error) {
        warn!(rank = self.comm.rank(), %error, "resolution failure recorded");
        self.local.push(error);
    }

    /// The collective check. Must be called on every rank of the
    /// communicator, failures or not.
    pub fn check(self) -> Result<(), Error> {
        let local = self.local.len() as u64;
        let global = self.comm.all_reduce_sum(local);
        if global == 0 {
            return Ok(());
        }
        let first = self
            .local
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "no failures on this rank".to_string());
        Err(Error::ResolutionFailures { global, local, rank: self.comm.rank(), first })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_reduce_is_identity() {
        assert_eq!(SoloComm.all_reduce_sum(7), 7);
    }

    #[test]
    fn shared_reduce_sums_over_ranks() {
        let comms = SharedComm::create(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let first = comm.all_reduce_sum(comm.rank() as u64 + 1);
                    let second = comm.all_reduce_sum(10);
                    (first, second)
                })
            })
            .collect();
        for h in handles {
            let (first, second) = h.join().unwrap();
            assert_eq!(first, 6);
            assert_eq!(second, 30);
        }
    }

    #[test]
    fn clean_hoard_passes() {
        let hoard = ErrorHoard::new(&SoloComm);
        assert!(hoard.check().is_ok());
    }

    #[test]
    fn hoard_rolls_up_local_failures() {
        let mut hoard = ErrorHoard::new(&SoloComm);
        hoard.record(Error::CorruptStream("x".into()));
        hoard.record(Error::CorruptStream("y".into()));
        match hoard.check().unwrap_err() {
            Error::ResolutionFailures { global, local, rank, .. } => {
                assert_eq!(global, 2);
                assert_eq!(local, 2);
                assert_eq!(rank, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hoard_fails_ranks_together() {
        let comms = SharedComm::create(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mut hoard = ErrorHoard::new(&comm);
                    if comm.rank() == 1 {
                        hoard.record(Error::CorruptStream("rank 1 only".into()));
                    }
                    hoard.check()
                })
            })
            .collect();
        for h in handles {
            let err = h.join().unwrap().unwrap_err();
            assert!(matches!(err, Error::ResolutionFailures { global: 1, .. }));
        }
    }
}
