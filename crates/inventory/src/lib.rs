//! Inventory ledger domain: one aggregate per physical garment.
//!
//! Pure, deterministic rules for the garment lifecycle (no IO, no HTTP, no
//! storage). Persistence and atomic claiming live in `seasons-infra`.

pub mod item;
pub mod state;
pub mod stats;

pub use item::{
    AllocateItem, InventoryCommand, InventoryEvent, InventoryItem, InventoryItemSnapshot,
    ItemAllocated, ItemRegistered, ItemRetired, RegisterItem, RetireItem, StateChanged,
    TransitionState,
};
pub use state::{InventoryState, QUARANTINE_DAYS};
pub use stats::InventoryStats;
