//! Transactional persistence for the ledger and the cycle model.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
pub use r#trait::{Claim, Store, StoreError, StoreTx};

/// Unique constraint names, shared by the SQL schema and the in-memory store.
pub mod constraints {
    pub const SKU: &str = "inventory_items_sku_key";
    pub const ONE_ACTIVE_SUBSCRIPTION: &str = "subscriptions_one_active_per_user";
    pub const ONE_OPEN_BOX: &str = "boxes_one_open_per_subscription";
    pub const BOX_CYCLE: &str = "boxes_subscription_cycle_key";
    pub const CART_ITEM: &str = "cart_items_pkey";
    pub const SWAP_ITEM: &str = "swap_items_pkey";
}
