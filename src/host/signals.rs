//! Subscription wiring between the host's migration lifecycle and the
//! topology lists.
//!
//! The host storage owns one [`MigrationSignals`] hub and emits the three
//! lifecycle notifications through it in strict causal order: export for
//! departing particles, import for arriving particles, rebuild after the
//! decomposition settles. A list subscribes once at construction and holds
//! the returned [`Subscription`] guard; dropping the guard (or the list)
//! disconnects deterministically — there are no manually scattered
//! connect/disconnect calls to forget.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::model::ParticleId;
use crate::topology::Error;

use super::resolver::HostView;
use super::storage::AtomisticStore;
use super::wire::{WireBuffer, WireReader};

/// Context for the export hook of one migration edge.
pub struct ExportCtx<'a> {
    /// Particles about to leave this rank over this edge.
    pub departing: &'a [ParticleId],
    /// The wire payload appended to the host's migration buffer.
    pub buf: &'a mut WireBuffer,
    /// The atomistic side-arena, mutable so the representative map can ship
    /// atomistic particles along with their virtual site.
    pub atomistic: &'a mut AtomisticStore,
}

/// Context for the import hook of one migration edge.
pub struct ImportCtx<'a> {
    /// Particles that just arrived on this rank.
    pub arriving: &'a [ParticleId],
    pub reader: &'a mut WireReader,
    pub atomistic: &'a mut AtomisticStore,
}

/// The three callbacks bound to the host's particle-migration lifecycle.
///
/// Export and import are always executed as a matched pair tied to one
/// migration edge; a relationship removed by export exists nowhere until the
/// matching import completes, but it is never lost. The rebuild hook runs
/// once per completed redecomposition, after every transfer of the round has
/// settled, and must be idempotent.
pub trait MigrationHooks {
    fn export_departing(&mut self, ctx: &mut ExportCtx<'_>) -> Result<(), Error>;

    fn import_arriving(&mut self, ctx: &mut ImportCtx<'_>) -> Result<(), Error>;

    fn rebuild_local(&mut self, host: &HostView<'_>) -> Result<(), Error>;
}

type Subscriber = Weak<RefCell<dyn MigrationHooks>>;

/// Registration hub for [`MigrationHooks`] subscribers.
///
/// Emission order is registration order on both the export and import side;
/// since each subscriber writes and reads its own wire chunks, send and
/// receive ranks must construct their lists in the same order.
#[derive(Default)]
pub struct MigrationSignals {
    subscribers: Rc<RefCell<Vec<(u64, Subscriber)>>>,
    next_id: std::cell::Cell<u64>,
}

impl MigrationSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, hooks: Subscriber) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, hooks));
        debug!(id, "migration hooks subscribed");
        Subscription { subscribers: Rc::downgrade(&self.subscribers), id }
    }

    /// Live subscribers, registration order, with dead ones pruned.
    fn snapshot(&self) -> Vec<Rc<RefCell<dyn MigrationHooks>>> {
        let mut list = self.subscribers.borrow_mut();
        list.retain(|(_, weak)| weak.strong_count() > 0);
        list.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
    }

    pub(crate) fn emit_export(&self, ctx: &mut ExportCtx<'_>) -> Result<(), Error> {
        for hooks in self.snapshot() {
            hooks.borrow_mut().export_departing(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn emit_import(&self, ctx: &mut ImportCtx<'_>) -> Result<(), Error> {
        for hooks in self.snapshot() {
            hooks.borrow_mut().import_arriving(ctx)?;
        }
        Ok(())
    }

    pub(crate) fn emit_rebuild(&self, host: &HostView<'_>) -> Result<(), Error> {
        for hooks in self.snapshot() {
            hooks.borrow_mut().rebuild_local(host)?;
        }
        Ok(())
    }
}

/// Scope-bound subscription: disconnects its hooks when dropped.
pub struct Subscription {
    subscribers: Weak<RefCell<Vec<(u64, Subscriber)>>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.subscribers.upgrade() {
            list.borrow_mut().retain(|(id, _)| *id != self.id);
            debug!(id = self.id, "migration hooks unsubscribed");
        }
    }
}
