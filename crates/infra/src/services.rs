//! Wiring for the rental services.
//!
//! Every operation follows the same shape:
//!
//! ```text
//! begin → load (version) → aggregate.execute → write (ExpectedVersion) → Outbox::record
//!       → commit → Outbox::publish
//! ```
//!
//! Any error before `commit` drops the transaction, which rolls it back.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use seasons_core::Clock;
use seasons_events::{EventBus, EventEnvelope};
use seasons_subscriptions::CyclePolicy;

use crate::allocation::{AllocationPolicy, AllocationService};
use crate::basket::BasketService;
use crate::cycle::CycleManager;
use crate::error::ServiceResult;
use crate::ledger::InventoryLedger;
use crate::outbox::Outbox;
use crate::store::{Store, StoreTx};

/// Shared handles every service works through.
pub struct ServiceContext<S, B> {
    pub(crate) store: Arc<S>,
    pub(crate) bus: Arc<B>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) policy: CyclePolicy,
}

impl<S, B> Clone for ServiceContext<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            bus: Arc::clone(&self.bus),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S, B> core::fmt::Debug for ServiceContext<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S, B> ServiceContext<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(store: Arc<S>, bus: Arc<B>, clock: Arc<dyn Clock>, policy: CyclePolicy) -> Self {
        Self {
            store,
            bus,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &CyclePolicy {
        &self.policy
    }

    pub(crate) async fn begin(&self) -> ServiceResult<S::Tx> {
        Ok(self.store.begin().await?)
    }

    /// Commit, then publish what the transaction recorded.
    pub(crate) async fn finish(&self, tx: S::Tx, outbox: Outbox) -> ServiceResult<()> {
        tx.commit().await?;
        outbox.publish(self.bus.as_ref());
        Ok(())
    }
}

/// The full service set over one store and one bus.
pub struct RentalServices<S, B> {
    pub ledger: InventoryLedger<S, B>,
    pub baskets: BasketService<S, B>,
    pub cycles: CycleManager<S, B>,
}

impl<S, B> Clone for RentalServices<S, B> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            baskets: self.baskets.clone(),
            cycles: self.cycles.clone(),
        }
    }
}

impl<S, B> RentalServices<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(
        store: Arc<S>,
        bus: Arc<B>,
        clock: Arc<dyn Clock>,
        cycle_policy: CyclePolicy,
        allocation_policy: AllocationPolicy,
    ) -> Self {
        let ctx = ServiceContext::new(store, bus, clock, cycle_policy);
        Self {
            ledger: InventoryLedger::new(ctx.clone()),
            baskets: BasketService::new(ctx.clone()),
            cycles: CycleManager::new(ctx, AllocationService::new(allocation_policy)),
        }
    }
}
