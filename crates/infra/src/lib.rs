//! Infrastructure layer: stores, configuration and the rental services that
//! orchestrate the ledger and the cycle model over one transaction each.

pub mod allocation;
pub mod basket;
pub mod config;
pub mod cycle;
pub mod error;
pub mod ledger;
pub mod outbox;
pub mod services;
pub mod store;

mod integration_tests;

pub use allocation::{AllocatedSlot, AllocationPolicy, AllocationResult, AllocationService};
pub use basket::BasketService;
pub use config::{ConfigError, RentalConfig};
pub use cycle::{BoxView, CheckoutReceipt, CycleManager, ReturnReceipt, SwapReceipt};
pub use error::{ServiceError, ServiceResult};
pub use ledger::{InventoryLedger, NewItem};
pub use outbox::Outbox;
pub use services::{RentalServices, ServiceContext};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError, StoreTx};
