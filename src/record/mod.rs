//! Raid ledger core: snapshots, valuation, the raid lifecycle state machine,
//! archive compression and the per-player durable store.
//!
//! Data flows in one direction. A raid-start event produces a pending
//! [`types::RaidRecord`] holding a begin-inventory snapshot; the raid-end
//! event adds the end snapshot, [`lifecycle::reconcile`] partitions the diff
//! into added/removed/changed and prices it, and [`archive::compress`]
//! collapses the result into a compact [`types::RaidArchive`] that
//! [`store::RecordStore`] persists per player. Pending records are mutable
//! (id remaps rewrite them in place); archives only ever change through
//! [`archive::recheck`].

pub mod archive;
pub mod errors;
pub mod lifecycle;
pub mod remap;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod valuation;

pub use archive::{compress, recheck, RecheckReport};
pub use errors::RecordError;
pub use lifecycle::RaidTracker;
pub use snapshot::snapshot_inventory;
pub use store::{ArchiveSelector, RecordStore};
pub use types::{
    InventorySnapshot, ItemRecord, RaidArchive, RaidEntry, RaidOutcome, RaidRecord, RaidStatus,
    Side,
};
