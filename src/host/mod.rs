//! Interfaces to the host storage/decomposition layer, plus a reference
//! in-memory host.
//!
//! - [`resolver`] – The lookup services a host must provide ("real" vs
//!   "local" vs atomistic-representative resolution).
//! - [`signals`] – Scope-bound subscription of topology lists to the host's
//!   three migration lifecycle notifications.
//! - [`wire`] – The flat integer/real payload appended to the host's
//!   migration buffer.
//! - [`collective`] – The all-reduce seam and the per-rank error hoard that
//!   makes ranks fail together.
//! - [`storage`] – A reference host: slot arenas with epoch-tagged handles,
//!   ghost mirrors, and drivers for export/import/rebuild.

pub mod collective;
pub mod resolver;
pub mod signals;
pub mod storage;
pub mod wire;

pub use collective::{Collective, ErrorHoard, SharedComm, SoloComm};
pub use resolver::{HostView, ParticleResolver};
pub use signals::{ExportCtx, ImportCtx, MigrationHooks, MigrationSignals, Subscription};
pub use storage::{AtomisticStore, MigrationParcel, ParticleStore};
pub use wire::{WireBuffer, WireReader};
