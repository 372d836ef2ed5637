//! The authoritative per-rank mapping from key participant to relationships.

use std::collections::BTreeMap;

use crate::model::{BondedTuple, ParticleId, Payload, TupleIds};

use super::error::Error;

/// Authoritative per-rank multimap: key participant id → relationships keyed
/// by it, each with its frozen payload.
///
/// A relationship lives in exactly one rank's index (the rank on which its
/// key particle is real) except while in transit between a matched
/// export/import pair. Keys are not unique — a particle commonly keys many
/// relationships — and enumeration order is deterministic (ascending key,
/// insertion order within a key), which makes rebuilds idempotent.
#[derive(Debug, Clone)]
pub struct TopologyIndex<T: BondedTuple, P: Payload> {
    entries: BTreeMap<ParticleId, Vec<(T, P)>>,
    len: usize,
    list: &'static str,
}

impl<T: BondedTuple, P: Payload> TopologyIndex<T, P> {
    pub fn new(list: &'static str) -> Self {
        Self { entries: BTreeMap::new(), len: 0, list }
    }

    /// Inserts a relationship. An identical tuple already present (identical
    /// after canonicalization, so symmetric duplicates count) is rejected
    /// with [`Error::Duplicate`].
    pub fn insert(&mut self, tuple: T, payload: P) -> Result<(), Error> {
        let bucket = self.entries.entry(tuple.key()).or_default();
        if bucket.iter().any(|(t, _)| *t == tuple) {
            return Err(Error::Duplicate { list: self.list, tuple: tuple.ordered() });
        }
        bucket.push((tuple, payload));
        self.len += 1;
        Ok(())
    }

    /// Removes one relationship; returns its payload if it was present.
    pub fn remove(&mut self, tuple: &T) -> Option<P> {
        let bucket = self.entries.get_mut(&tuple.key())?;
        let at = bucket.iter().position(|(t, _)| t == tuple)?;
        let (_, payload) = bucket.remove(at);
        if bucket.is_empty() {
            self.entries.remove(&tuple.key());
        }
        self.len -= 1;
        Some(payload)
    }

    /// Drains every relationship keyed by `key`; the single hand-off point
    /// used by the export phase.
    pub fn remove_key(&mut self, key: ParticleId) -> Option<Vec<(T, P)>> {
        let bucket = self.entries.remove(&key)?;
        self.len -= bucket.len();
        Some(bucket)
    }

    /// Number of relationships keyed by `key`.
    pub fn count(&self, key: ParticleId) -> usize {
        self.entries.get(&key).map_or(0, Vec::len)
    }

    /// The relationships keyed by `key`.
    pub fn relationships(&self, key: ParticleId) -> &[(T, P)] {
        self.entries.get(&key).map_or(&[], Vec::as_slice)
    }

    /// The frozen payload of one relationship, if present.
    pub fn payload(&self, tuple: &T) -> Option<&P> {
        self.entries
            .get(&tuple.key())?
            .iter()
            .find(|(t, _)| t == tuple)
            .map(|(_, p)| p)
    }

    pub fn contains(&self, tuple: &T) -> bool {
        self.payload(tuple).is_some()
    }

    /// Restartable enumeration in deterministic order, used for
    /// checkpointing and introspection.
    pub fn iter(&self) -> impl Iterator<Item = (&T, &P)> {
        self.entries.values().flatten().map(|(t, p)| (t, p))
    }

    /// Enumerates key buckets in ascending key order.
    pub fn iter_keys(&self) -> impl Iterator<Item = (ParticleId, &[(T, P)])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Participant id tuples of every indexed relationship, in deterministic
    /// order.
    pub fn enumerate(&self) -> Vec<TupleIds> {
        self.iter().map(|(t, _)| t.ordered()).collect()
    }

    /// Local relationship count on this rank.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }
}
