//! Inventory ledger: intake, allocation claims, state changes and stock
//! queries over the physical garment fleet.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::instrument;

use seasons_core::{
    Aggregate, AggregateRoot, Conflict, DomainError, ExpectedVersion, InventoryItemId,
    ProductSlug, Resource, Sku,
};
use seasons_events::{EventBus, EventEnvelope};
use seasons_inventory::{
    InventoryCommand, InventoryEvent, InventoryItem, InventoryState, InventoryStats, ItemAllocated,
    RegisterItem, RetireItem, TransitionState,
};

use crate::error::{ServiceError, ServiceResult};
use crate::outbox::{INVENTORY_ITEM, Outbox};
use crate::services::ServiceContext;
use crate::store::{Claim, Store, StoreError, StoreTx, constraints};

/// One garment to take into stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub product: ProductSlug,
    pub sku: Sku,
    #[serde(default)]
    pub condition_notes: Option<String>,
}

pub struct InventoryLedger<S, B> {
    ctx: ServiceContext<S, B>,
}

impl<S, B> Clone for InventoryLedger<S, B> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S, B> InventoryLedger<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(ctx: ServiceContext<S, B>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, item), fields(product = %item.product, sku = %item.sku), err)]
    pub async fn register_item(&self, item: NewItem) -> ServiceResult<InventoryItem> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let registered = register_in(&mut tx, &item, now, &mut outbox).await?;

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(item_id = %registered.id_typed(), "inventory item registered");
        Ok(registered)
    }

    /// Bulk intake; either every item is registered or none is.
    #[instrument(skip(self, items), fields(count = items.len()), err)]
    pub async fn register_batch(&self, items: Vec<NewItem>) -> ServiceResult<Vec<InventoryItem>> {
        if items.is_empty() {
            return Err(DomainError::validation("batch must contain at least one item").into());
        }
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(&item.sku) {
                return Err(
                    DomainError::conflict(Conflict::DuplicateSku(item.sku.to_string())).into(),
                );
            }
        }

        let now = self.ctx.clock.now();
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut registered = Vec::with_capacity(items.len());
        for item in &items {
            registered.push(register_in(&mut tx, item, now, &mut outbox).await?);
        }

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(count = registered.len(), "inventory batch registered");
        Ok(registered)
    }

    pub async fn get_item(&self, id: InventoryItemId) -> ServiceResult<InventoryItem> {
        let mut tx = self.ctx.begin().await?;
        let item = tx
            .load_item(id)
            .await?
            .ok_or(DomainError::not_found(Resource::InventoryItem))?;
        tx.commit().await?;
        Ok(item)
    }

    pub async fn list_items(&self, product: Option<&ProductSlug>) -> ServiceResult<Vec<InventoryItem>> {
        let mut tx = self.ctx.begin().await?;
        let items = tx.list_items(product).await?;
        tx.commit().await?;
        Ok(items)
    }

    pub async fn count_available(&self, product: &ProductSlug) -> ServiceResult<u64> {
        let counts = self.availability(std::slice::from_ref(product)).await?;
        Ok(counts.get(product).copied().unwrap_or(0))
    }

    /// Eligible counts for several products in one query; unknown products
    /// map to zero.
    #[instrument(skip(self, products), fields(product_count = products.len()), err)]
    pub async fn availability(
        &self,
        products: &[ProductSlug],
    ) -> ServiceResult<BTreeMap<ProductSlug, u64>> {
        let today = self.ctx.clock.today();
        let mut tx = self.ctx.begin().await?;
        let counts = tx.count_available(products, today).await?;
        tx.commit().await?;

        Ok(products
            .iter()
            .map(|p| (p.clone(), counts.get(p).copied().unwrap_or(0)))
            .collect())
    }

    /// Claim the oldest eligible garment of `product` outside any box.
    #[instrument(skip(self), fields(product = %product), err)]
    pub async fn claim_one_available(&self, product: &ProductSlug) -> ServiceResult<InventoryItem> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let item = claim_in(&mut tx, product, now, &mut outbox)
            .await?
            .ok_or_else(|| DomainError::out_of_stock(product))?;

        self.ctx.finish(tx, outbox).await?;
        Ok(item)
    }

    /// Move an item along the ledger state machine. `to == retired` takes
    /// `notes` as the retirement reason.
    #[instrument(skip(self, notes), fields(item_id = %id, to = %to), err)]
    pub async fn transition_state(
        &self,
        id: InventoryItemId,
        to: InventoryState,
        notes: Option<String>,
    ) -> ServiceResult<InventoryItem> {
        let command = InventoryCommand::TransitionState(TransitionState {
            item_id: id,
            to,
            notes,
            occurred_at: self.ctx.clock.now(),
        });
        self.run(id, command).await
    }

    #[instrument(skip(self, reason), fields(item_id = %id), err)]
    pub async fn retire(&self, id: InventoryItemId, reason: String) -> ServiceResult<InventoryItem> {
        let command = InventoryCommand::Retire(RetireItem {
            item_id: id,
            reason,
            occurred_at: self.ctx.clock.now(),
        });
        self.run(id, command).await
    }

    pub async fn stats(&self) -> ServiceResult<InventoryStats> {
        let today = self.ctx.clock.today();
        let mut tx = self.ctx.begin().await?;
        let stats = tx.inventory_stats(today).await?;
        tx.commit().await?;
        Ok(stats)
    }

    async fn run(&self, id: InventoryItemId, command: InventoryCommand) -> ServiceResult<InventoryItem> {
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut item = tx
            .load_item(id)
            .await?
            .ok_or(DomainError::not_found(Resource::InventoryItem))?;
        let from = item.state();
        execute_in(&mut tx, &mut item, &command, &mut outbox).await?;

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(item_id = %id, from = %from, to = %item.state(), "inventory state changed");
        Ok(item)
    }
}

async fn register_in<T: StoreTx>(
    tx: &mut T,
    new: &NewItem,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> ServiceResult<InventoryItem> {
    let (item, event) = InventoryItem::register(&RegisterItem {
        item_id: InventoryItemId::new(),
        product: new.product.clone(),
        sku: new.sku.clone(),
        condition_notes: new.condition_notes.clone(),
        occurred_at: now,
    })?;
    tx.insert_item(&item)
        .await
        .map_err(|e| duplicate_sku(e, &new.sku))?;
    outbox.record(INVENTORY_ITEM, *item.id_typed().as_uuid(), item.version(), &event)?;
    Ok(item)
}

fn duplicate_sku(err: StoreError, sku: &Sku) -> ServiceError {
    if err.is_unique_violation(constraints::SKU) {
        DomainError::conflict(Conflict::DuplicateSku(sku.to_string())).into()
    } else {
        err.into()
    }
}

/// Run `command` against a loaded item and persist it under the loaded
/// version.
pub(crate) async fn execute_in<T: StoreTx>(
    tx: &mut T,
    item: &mut InventoryItem,
    command: &InventoryCommand,
    outbox: &mut Outbox,
) -> ServiceResult<()> {
    let expected = ExpectedVersion::Exact(item.version());
    let events = item.execute(command)?;
    tx.update_item(item, expected).await?;

    let base = item.version() - events.len() as u64;
    for (offset, event) in events.iter().enumerate() {
        outbox.record(
            INVENTORY_ITEM,
            *item.id_typed().as_uuid(),
            base + offset as u64 + 1,
            event,
        )?;
    }
    Ok(())
}

/// Claim inside the caller's transaction; `None` when nothing is eligible.
pub(crate) async fn claim_in<T: StoreTx>(
    tx: &mut T,
    product: &ProductSlug,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> ServiceResult<Option<InventoryItem>> {
    let Some(Claim { item, prior_state }) = tx.claim_one_available(product, now).await? else {
        return Ok(None);
    };
    let event = InventoryEvent::ItemAllocated(ItemAllocated {
        item_id: item.id_typed(),
        product: product.clone(),
        from: prior_state,
        occurred_at: now,
    });
    outbox.record(INVENTORY_ITEM, *item.id_typed().as_uuid(), item.version(), &event)?;
    tracing::debug!(item_id = %item.id_typed(), from = %prior_state, "inventory item claimed");
    Ok(Some(item))
}
