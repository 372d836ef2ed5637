//! Lookup services the host storage layer provides to the topology layer.

use crate::model::{ParticleId, ParticleRef};

use super::collective::Collective;

/// Resolves particle ids into rank-local handles.
///
/// `lookup_real` succeeds only for particles whose authoritative state is
/// owned by this rank; `lookup_local` also accepts ghosts (read-only mirrors
/// of remotely-owned particles, valid for the current decomposition epoch).
/// `lookup_representative` is the atomistic-resolution variant: it resolves
/// ids of atomistic representatives stored alongside their coarse-grained
/// virtual site.
pub trait ParticleResolver {
    fn lookup_real(&self, id: ParticleId) -> Option<ParticleRef>;

    fn lookup_local(&self, id: ParticleId) -> Option<ParticleRef>;

    fn lookup_representative(&self, id: ParticleId) -> Option<ParticleRef>;

    /// Position of a resolved particle; `None` if the handle is stale.
    fn position(&self, handle: ParticleRef) -> Option<[f64; 3]>;

    /// Displacement `to - from` under the host's boundary conditions
    /// (minimum image for a periodic box, plain difference otherwise).
    fn displacement(&self, from: [f64; 3], to: [f64; 3]) -> [f64; 3];
}

/// Everything a topology list needs from the host during an operation:
/// the lookup services, the communicator, and the current epoch.
#[derive(Clone, Copy)]
pub struct HostView<'a> {
    pub resolver: &'a dyn ParticleResolver,
    pub comm: &'a dyn Collective,
    pub epoch: u32,
}
