//! Core data model for bonded-relationship bookkeeping.
//!
//! This module provides the foundational types that flow through `bondspan`:
//!
//! - [`particle`] – Stable particle identity and epoch-tagged local handles.
//! - [`tuple`] – Relationship tuples (singles, pairs, triples, quadruples)
//!   with their asymmetric key roles and construction-time canonicalization.
//! - [`payload`] – Frozen per-relationship payloads and their wire form.
//! - [`geometry`] – Vector helpers used to measure geometric payloads once,
//!   at relationship creation.
//!
//! The data model intentionally separates the *global* identity of a
//! relationship (ids, canonical order) from its *local* resolution
//! ([`ParticleRef`] handles), so the topology layer can move relationships
//! between ranks without ever shipping rank-local state.
//!
//! [`ParticleRef`]: particle::ParticleRef

pub mod geometry;
pub mod particle;
pub mod payload;
pub mod tuple;

pub use particle::{Particle, ParticleId, ParticleRef, Realm};
pub use payload::Payload;
pub use tuple::{BondedTuple, MAX_ARITY, Pair, Quadruple, Single, Triple, TupleIds};
