//! Distributed bonded-topology bookkeeping.
//!
//! Each [`BondedList`] keeps one kind of bonded relationship (group tags,
//! bond pairs, angle triples, dihedral quadruples) consistent across the
//! host's spatial decomposition:
//!
//! - [`index`] – The authoritative per-rank index, keyed on the owning
//!   participant.
//! - [`list`] – The list itself: add/remove between communication rounds,
//!   migration hooks keeping relationships with their key particle, and the
//!   resolved working list force kernels iterate.
//! - [`working`] – The epoch-scoped resolved view.
//! - [`adress`] – The virtual-site/representative mapping for atomistic
//!   resolution mode.
//! - [`error`] – All the ways consistency can be lost, as typed errors.

pub mod adress;
pub mod error;
pub mod index;
pub mod list;
pub mod working;

pub use adress::{RepresentativeMap, ResolvedGroup};
pub use error::Error;
pub use index::TopologyIndex;
pub use list::{
    AngleList, Binding, BondList, BondedList, DihedralList, RestAngleList, RestDihedralList,
    RestLengthBondList, TagList,
};
pub use working::{ResolvedTuple, WorkingList};
