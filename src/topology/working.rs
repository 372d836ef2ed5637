//! The rank-local resolved view consumed by force/energy kernels.

use crate::model::{MAX_ARITY, ParticleId, ParticleRef, Realm, TupleIds};

/// One fully resolved relationship: participant ids in geometric order and
/// the matching rank-local handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTuple {
    ids: TupleIds,
    refs: [ParticleRef; MAX_ARITY],
}

impl ResolvedTuple {
    pub(crate) fn new(ids: TupleIds, refs: &[ParticleRef]) -> Self {
        debug_assert_eq!(ids.len(), refs.len());
        let mut buf = [ParticleRef::new(Realm::Site, 0, 0); MAX_ARITY];
        buf[..refs.len()].copy_from_slice(refs);
        Self { ids, refs: buf }
    }

    #[inline]
    pub fn ids(&self) -> &[ParticleId] {
        self.ids.as_slice()
    }

    #[inline]
    pub fn refs(&self) -> &[ParticleRef] {
        &self.refs[..self.ids.len()]
    }
}

/// The resolved, rank-local sequence of relationships for one decomposition
/// epoch.
///
/// Rebuilt wholesale — never patched — after every redecomposition. Entries
/// (and the handles inside them) are valid only until the next rebuild;
/// handles retained longer stop dereferencing rather than pointing at stale
/// memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingList {
    epoch: u32,
    entries: Vec<ResolvedTuple>,
}

impl WorkingList {
    pub(crate) fn new(epoch: u32) -> Self {
        Self { epoch, entries: Vec::new() }
    }

    pub(crate) fn push(&mut self, entry: ResolvedTuple) {
        self.entries.push(entry);
    }

    /// The decomposition epoch this view was resolved in.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restartable iteration; invalidated by the next rebuild.
    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedTuple> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[ResolvedTuple] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a WorkingList {
    type Item = &'a ResolvedTuple;
    type IntoIter = std::slice::Iter<'a, ResolvedTuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
