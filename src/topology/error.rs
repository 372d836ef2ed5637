//! Error types for the topology-consistency layer.
//!
//! Errors are categorized by the phase that raises them: relationship
//! creation (duplicates, unreachable partners), the import half of a
//! migration (corrupt wire data), and the post-decomposition rebuild
//! (unresolvable participants, rolled up across ranks).

use thiserror::Error;

use crate::model::{ParticleId, TupleIds};

/// Errors that can occur while keeping bonded relationships consistent
/// across a dynamic domain decomposition.
///
/// Resolution failures during a rebuild are never returned one by one: each
/// rank hoards its local failures and the ranks then fail *together* through
/// a single collective check ([`Error::ResolutionFailures`]), so no rank is
/// left waiting in a later collective operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A relationship was given the wrong number of participants.
    #[error("{list}: a {kind} takes {expected} participants, got {got}")]
    Arity {
        list: &'static str,
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    /// The relationship is already present; duplicates are rejected and
    /// reported, never silently swallowed.
    #[error("{list}: duplicate relationship {tuple} rejected")]
    Duplicate { list: &'static str, tuple: TupleIds },

    /// A non-key participant could not be resolved at creation time even as
    /// a ghost. The relationship spans farther than the communication range,
    /// which is a topology/geometry inconsistency, not a transient state.
    #[error(
        "{list}: partner particle {partner} of {tuple} is not local on this rank and cannot be added"
    )]
    PartnerUnreachable {
        list: &'static str,
        tuple: TupleIds,
        partner: ParticleId,
    },

    /// The key participant of an indexed relationship was not real during a
    /// rebuild. This rank's copy of the relationship is stale or corrupt.
    #[error("{list}: key particle {key} of {tuple} is not real on this rank during rebuild")]
    KeyUnresolved {
        list: &'static str,
        tuple: TupleIds,
        key: ParticleId,
    },

    /// A partner of an indexed relationship was not even local during a
    /// rebuild: the relationship's geometric span exceeds the configured
    /// ghost/communication range.
    #[error(
        "{list}: partner particle {partner} of {tuple} exceeds the ghost range during rebuild"
    )]
    PartnerOutOfRange {
        list: &'static str,
        tuple: TupleIds,
        partner: ParticleId,
    },

    /// The import phase read a wire stream whose layout does not match what
    /// the matching export wrote. Always fatal.
    #[error("migration stream corrupt: {0}")]
    CorruptStream(String),

    /// A particle the host asked to migrate out is not real on this rank.
    #[error("particle {0} is not real on this rank and cannot depart")]
    UnknownParticle(ParticleId),

    /// The collective roll-up of per-rank resolution failures. Raised on
    /// every rank of the communicator, including ranks with no local
    /// failures of their own.
    #[error(
        "{global} relationship resolution failure(s) across all ranks \
         ({local} on rank {rank}); first local failure: {first}"
    )]
    ResolutionFailures {
        global: u64,
        local: u64,
        rank: usize,
        first: String,
    },
}
