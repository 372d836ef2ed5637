use std::fmt;

use super::particle::ParticleId;

/// Largest relationship arity the subsystem handles (dihedral quadruples).
pub const MAX_ARITY: usize = 4;

/// A fixed-capacity ordered sequence of participant ids.
///
/// Used wherever a relationship's participants are enumerated — wire
/// serialization, resolution during rebuild, error messages — without
/// allocating per relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupleIds {
    len: u8,
    ids: [ParticleId; MAX_ARITY],
}

impl TupleIds {
    pub fn new(ids: &[ParticleId]) -> Self {
        debug_assert!(ids.len() <= MAX_ARITY);
        let mut buf = [ParticleId(0); MAX_ARITY];
        buf[..ids.len()].copy_from_slice(ids);
        Self { len: ids.len() as u8, ids: buf }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[ParticleId] {
        &self.ids[..self.len as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.as_slice().iter().copied()
    }
}

impl fmt::Display for TupleIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, id) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, ")")
    }
}

/// A bonded relationship tuple with one distinguished key participant.
///
/// The key determines which rank is authoritative for the relationship: it
/// lives in exactly one rank's topology index, the rank on which the key
/// particle is real. Implementations canonicalize their participant order at
/// construction, so plain `==` recognizes symmetric duplicates — equality is
/// never re-derived at lookup sites.
pub trait BondedTuple: Copy + Eq + Ord + fmt::Debug + 'static {
    /// Number of participants (1–4).
    const ARITY: usize;

    /// Human-readable kind name used in log and error messages.
    const KIND: &'static str;

    /// Builds the canonical tuple from participants in geometric order.
    ///
    /// Callers must pass exactly [`Self::ARITY`] ids; the public list API
    /// checks arity before reaching this point.
    fn from_ids(ids: &[ParticleId]) -> Self;

    /// Rebuilds the tuple from the wire form (key + canonical partners).
    fn from_key_partners(key: ParticleId, partners: &[ParticleId]) -> Self;

    /// The distinguished key participant.
    fn key(&self) -> ParticleId;

    /// Non-key participants in canonical (wire) order.
    fn partners(&self) -> TupleIds;

    /// All participants in geometric order, for resolution and display.
    fn ordered(&self) -> TupleIds;
}

/// A singleton group membership; the particle id is its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Single {
    id: ParticleId,
}

impl BondedTuple for Single {
    const ARITY: usize = 1;
    const KIND: &'static str = "single";

    fn from_ids(ids: &[ParticleId]) -> Self {
        debug_assert_eq!(ids.len(), 1);
        Self { id: ids[0] }
    }

    fn from_key_partners(key: ParticleId, partners: &[ParticleId]) -> Self {
        debug_assert!(partners.is_empty());
        Self { id: key }
    }

    fn key(&self) -> ParticleId {
        self.id
    }

    fn partners(&self) -> TupleIds {
        TupleIds::new(&[])
    }

    fn ordered(&self) -> TupleIds {
        TupleIds::new(&[self.id])
    }
}

/// A bond pair, keyed on the lower id.
///
/// `(2, 1)` and `(1, 2)` construct the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    lo: ParticleId,
    hi: ParticleId,
}

impl BondedTuple for Pair {
    const ARITY: usize = 2;
    const KIND: &'static str = "pair";

    fn from_ids(ids: &[ParticleId]) -> Self {
        debug_assert_eq!(ids.len(), 2);
        let (a, b) = (ids[0], ids[1]);
        if a <= b { Self { lo: a, hi: b } } else { Self { lo: b, hi: a } }
    }

    fn from_key_partners(key: ParticleId, partners: &[ParticleId]) -> Self {
        debug_assert_eq!(partners.len(), 1);
        Self::from_ids(&[key, partners[0]])
    }

    fn key(&self) -> ParticleId {
        self.lo
    }

    fn partners(&self) -> TupleIds {
        TupleIds::new(&[self.hi])
    }

    fn ordered(&self) -> TupleIds {
        TupleIds::new(&[self.lo, self.hi])
    }
}

/// An angle triple, keyed on the middle id.
///
/// The two end ids are stored min-first, so `(1, 2, 3)` and `(3, 2, 1)`
/// denote the same relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    mid: ParticleId,
    ends: [ParticleId; 2],
}

impl BondedTuple for Triple {
    const ARITY: usize = 3;
    const KIND: &'static str = "triple";

    fn from_ids(ids: &[ParticleId]) -> Self {
        debug_assert_eq!(ids.len(), 3);
        let (a, mid, c) = (ids[0], ids[1], ids[2]);
        let ends = if a <= c { [a, c] } else { [c, a] };
        Self { mid, ends }
    }

    fn from_key_partners(key: ParticleId, partners: &[ParticleId]) -> Self {
        debug_assert_eq!(partners.len(), 2);
        Self::from_ids(&[partners[0], key, partners[1]])
    }

    fn key(&self) -> ParticleId {
        self.mid
    }

    fn partners(&self) -> TupleIds {
        TupleIds::new(&self.ends)
    }

    fn ordered(&self) -> TupleIds {
        TupleIds::new(&[self.ends[0], self.mid, self.ends[1]])
    }
}

/// A dihedral quadruple, keyed on the first id.
///
/// The three non-key ids are stored as the lexicographically smaller of the
/// given order and its reversal, so `(1, 2, 3, 4)` and `(1, 4, 3, 2)` denote
/// the same relationship. Tuples with a different first id are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quadruple {
    head: ParticleId,
    tail: [ParticleId; 3],
}

impl BondedTuple for Quadruple {
    const ARITY: usize = 4;
    const KIND: &'static str = "quadruple";

    fn from_ids(ids: &[ParticleId]) -> Self {
        debug_assert_eq!(ids.len(), 4);
        let fwd = [ids[1], ids[2], ids[3]];
        let rev = [ids[3], ids[2], ids[1]];
        let tail = if fwd <= rev { fwd } else { rev };
        Self { head: ids[0], tail }
    }

    fn from_key_partners(key: ParticleId, partners: &[ParticleId]) -> Self {
        debug_assert_eq!(partners.len(), 3);
        Self::from_ids(&[key, partners[0], partners[1], partners[2]])
    }

    fn key(&self) -> ParticleId {
        self.head
    }

    fn partners(&self) -> TupleIds {
        TupleIds::new(&self.tail)
    }

    fn ordered(&self) -> TupleIds {
        TupleIds::new(&[self.head, self.tail[0], self.tail[1], self.tail[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ParticleId> {
        raw.iter().map(|&v| ParticleId(v)).collect()
    }

    #[test]
    fn pair_canonicalizes_on_lower_key() {
        let a = Pair::from_ids(&ids(&[1, 2]));
        let b = Pair::from_ids(&ids(&[2, 1]));
        assert_eq!(a, b);
        assert_eq!(a.key(), ParticleId(1));
        assert_eq!(a.partners().as_slice(), &[ParticleId(2)]);
    }

    #[test]
    fn triple_reversal_is_identical() {
        let a = Triple::from_ids(&ids(&[1, 2, 3]));
        let b = Triple::from_ids(&ids(&[3, 2, 1]));
        assert_eq!(a, b);
        assert_eq!(a.key(), ParticleId(2));
        assert_eq!(a.ordered().as_slice(), ids(&[1, 2, 3]).as_slice());
    }

    #[test]
    fn triple_with_different_middle_differs() {
        let a = Triple::from_ids(&ids(&[1, 2, 3]));
        let b = Triple::from_ids(&ids(&[2, 1, 3]));
        assert_ne!(a, b);
    }

    #[test]
    fn quadruple_tail_reversal_is_identical() {
        let a = Quadruple::from_ids(&ids(&[1, 2, 3, 4]));
        let b = Quadruple::from_ids(&ids(&[1, 4, 3, 2]));
        assert_eq!(a, b);
        assert_eq!(a.key(), ParticleId(1));
    }

    #[test]
    fn quadruple_key_is_not_symmetric() {
        let a = Quadruple::from_ids(&ids(&[1, 2, 3, 4]));
        let b = Quadruple::from_ids(&ids(&[4, 3, 2, 1]));
        assert_ne!(a, b);
    }

    #[test]
    fn wire_round_trip_reconstructs_tuple() {
        let t = Triple::from_ids(&ids(&[7, 5, 3]));
        let back = Triple::from_key_partners(t.key(), t.partners().as_slice());
        assert_eq!(t, back);

        let q = Quadruple::from_ids(&ids(&[2, 9, 4, 6]));
        let back = Quadruple::from_key_partners(q.key(), q.partners().as_slice());
        assert_eq!(q, back);
    }

    #[test]
    fn tuple_ids_displays_parenthesized() {
        let t = Triple::from_ids(&ids(&[1, 2, 3]));
        assert_eq!(t.ordered().to_string(), "(1, 2, 3)");
    }
}
