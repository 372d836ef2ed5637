//! Bonded-topology consistency for spatially decomposed particle systems.
//! `bondspan` keeps fixed bonded relationships — group tags, bond pairs,
//! angle triples, dihedral quadruples — correct while particles migrate
//! between ranks, and hands force/energy kernels a rank-local resolved view
//! that is rebuilt after every redecomposition.
//!
//! # Features
//!
//! - **Keyed ownership** — Every relationship lives on exactly one rank, the
//!   one owning its key participant, and migrates with that particle
//! - **Automatic migration** — Lists subscribe to the host's export/import/
//!   rebuild lifecycle once, at construction; nothing is re-wired per round
//! - **Epoch-tagged handles** — Resolved handles from a previous
//!   decomposition are detectably stale, never dangling
//! - **Frozen payloads** — Rest lengths and rest angles measured once, at
//!   creation, and carried verbatim across migrations
//! - **Atomistic resolution mode** — Relationships over atomistic
//!   representatives that ride along with their coarse-grained virtual site
//! - **Collective failure** — Resolution failures are reduced over all
//!   ranks, so everyone aborts together instead of deadlocking a later
//!   collective
//!
//! # Quick Start
//!
//! Bind a [`BondList`] to a [`ParticleStore`], add relationships on whichever
//! rank owns the key participant, and let migration carry them along:
//!
//! ```
//! use bondspan::{BondList, Particle, ParticleId, ParticleStore};
//!
//! // Two ranks of a decomposed system, each with its own store.
//! let mut left = ParticleStore::solo();
//! left.add_real(Particle::new(1u64, [0.0, 0.0, 0.0]));
//! left.add_real(Particle::new(2u64, [1.0, 0.0, 0.0]));
//! let mut right = ParticleStore::solo();
//! right.add_real(Particle::new(3u64, [2.0, 0.0, 0.0]));
//!
//! // Lists subscribe to their store's migration lifecycle at construction.
//! let bonds_left = BondList::bind(&left, "bond");
//! let bonds_right = BondList::bind(&right, "bond");
//!
//! // Only the rank owning the key participant indexes the relationship.
//! assert!(bonds_left.add(&left.view(), &[ParticleId(1), ParticleId(2)])?);
//! assert_eq!(bonds_left.len(), 1);
//! assert_eq!(bonds_right.len(), 0);
//!
//! // Particles 1 and 2 cross to the right rank; their bond rides along.
//! let parcel = left.migrate_out(&[ParticleId(1), ParticleId(2)])?;
//! right.migrate_in(parcel)?;
//! assert_eq!(bonds_left.len(), 0);
//! assert_eq!(bonds_right.len(), 1);
//!
//! // After the decomposition settles, the working list resolves locally.
//! left.complete_decomposition()?;
//! right.complete_decomposition()?;
//! let working = bonds_right.working();
//! assert_eq!(working.len(), 1);
//! assert_eq!(working.as_slice()[0].ids(), &[ParticleId(1), ParticleId(2)]);
//! # Ok::<(), bondspan::Error>(())
//! ```
//!
//! # Module Organization
//!
//! - [`model`] — Particle identity, relationship tuples, frozen payloads
//! - [`topology`] — The bonded lists, their authoritative index, and the
//!   atomistic-representative map
//! - [`host`] — The seams toward the host storage/decomposition layer and a
//!   reference in-memory host
//!
//! # Data Types
//!
//! ## Relationship Lists
//!
//! - [`BondedList`] — Generic list over a tuple kind and a frozen payload
//! - [`TagList`], [`BondList`], [`AngleList`], [`DihedralList`] —
//!   Payload-free aliases per arity
//! - [`RestLengthBondList`], [`RestAngleList`], [`RestDihedralList`] —
//!   Aliases carrying a geometric payload frozen at creation
//! - [`RepresentativeMap`] — Virtual-site to atomistic-representative groups
//!
//! ## Host Seams
//!
//! - [`ParticleStore`] — Reference per-rank store and lifecycle driver
//! - [`ParticleResolver`] — Id-to-handle lookup services a host provides
//! - [`MigrationHooks`] / [`MigrationSignals`] — The three lifecycle
//!   notifications and their subscription hub
//! - [`Collective`] — The summing all-reduce seam ([`SoloComm`],
//!   [`SharedComm`])

pub mod host;
pub mod model;
pub mod topology;

pub use model::{
    BondedTuple, MAX_ARITY, Pair, Particle, ParticleId, ParticleRef, Payload, Quadruple, Realm,
    Single, Triple, TupleIds,
};

pub use topology::{
    AngleList, Binding, BondList, BondedList, DihedralList, Error, RepresentativeMap,
    ResolvedGroup, ResolvedTuple, RestAngleList, RestDihedralList, RestLengthBondList, TagList,
    WorkingList,
};

pub use host::{
    AtomisticStore, Collective, ErrorHoard, HostView, MigrationHooks, MigrationParcel,
    MigrationSignals, ParticleResolver, ParticleStore, SharedComm, SoloComm, Subscription,
    WireBuffer, WireReader,
};
