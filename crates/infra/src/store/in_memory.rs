//! In-memory store for dev and tests.
//!
//! A transaction takes the store-wide async lock and works on a private copy
//! of the state. `commit` swaps the copy in; dropping the transaction
//! discards it. Transactions are therefore fully serialized, which trivially
//! gives the claim exclusivity the Postgres store gets from row locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use seasons_core::{
    Aggregate, AggregateRoot, BoxId, ExpectedVersion, InventoryItemId, ProductSlug,
    SubscriptionId, UserId,
};
use seasons_inventory::{AllocateItem, InventoryCommand, InventoryItem, InventoryStats};
use seasons_subscriptions::{
    BasketKey, BasketKind, BoxItem, RentalBox, SelectionBasket, ShippingDetails, Subscription,
    SubscriptionStatus,
};

use super::constraints;
use super::r#trait::{Claim, Store, StoreError, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    items: HashMap<InventoryItemId, InventoryItem>,
    baskets: HashMap<BasketKey, Vec<ProductSlug>>,
    customers: HashMap<UserId, ShippingDetails>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    boxes: HashMap<BoxId, RentalBox>,
    box_items: Vec<BoxItem>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(InMemoryTx { guard, work })
    }
}

#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn check_version(
    entity: &str,
    id: impl core::fmt::Display,
    expected: ExpectedVersion,
    actual: u64,
) -> Result<(), StoreError> {
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Stale(format!(
            "{entity} {id} is at version {actual}, expected {expected:?}"
        )))
    }
}

fn basket_constraint(key: BasketKey) -> &'static str {
    match key.kind() {
        BasketKind::Cart => constraints::CART_ITEM,
        BasketKind::Swap => constraints::SWAP_ITEM,
    }
}

impl MemoryState {
    fn other_active_subscription(&self, subscription: &Subscription) -> bool {
        subscription.status() == SubscriptionStatus::Active
            && self.subscriptions.values().any(|s| {
                s.id_typed() != subscription.id_typed()
                    && s.user_id() == subscription.user_id()
                    && s.status() == SubscriptionStatus::Active
            })
    }

    fn other_open_box(&self, rental_box: &RentalBox) -> bool {
        rental_box.is_open()
            && self.boxes.values().any(|b| {
                b.id_typed() != rental_box.id_typed()
                    && b.subscription_id() == rental_box.subscription_id()
                    && b.is_open()
            })
    }
}

fn newest_first(mut subscriptions: Vec<Subscription>) -> Vec<Subscription> {
    subscriptions.sort_by(|a, b| {
        (b.created_at(), b.id_typed()).cmp(&(a.created_at(), a.id_typed()))
    });
    subscriptions
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_item(&mut self, item: &InventoryItem) -> Result<(), StoreError> {
        if self.work.items.values().any(|i| i.sku() == item.sku()) {
            return Err(StoreError::unique(constraints::SKU));
        }
        if self.work.items.contains_key(&item.id_typed()) {
            return Err(StoreError::unique("inventory_items_pkey"));
        }
        self.work.items.insert(item.id_typed(), item.clone());
        Ok(())
    }

    async fn load_item(&mut self, id: InventoryItemId) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self.work.items.get(&id).cloned())
    }

    async fn update_item(
        &mut self,
        item: &InventoryItem,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let id = item.id_typed();
        let stored = self
            .work
            .items
            .get(&id)
            .ok_or_else(|| StoreError::Stale(format!("inventory item {id} does not exist")))?;
        check_version("inventory item", id, expected, stored.version())?;
        self.work.items.insert(id, item.clone());
        Ok(())
    }

    async fn list_items(
        &mut self,
        product: Option<&ProductSlug>,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let mut items: Vec<InventoryItem> = self
            .work
            .items
            .values()
            .filter(|i| product.is_none_or(|p| i.product() == p))
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.created_at(), a.sku()).cmp(&(b.created_at(), b.sku())));
        Ok(items)
    }

    async fn claim_one_available(
        &mut self,
        product: &ProductSlug,
        now: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError> {
        let today = now.date_naive();
        let candidate = self
            .work
            .items
            .values()
            .filter(|i| i.product() == product && i.is_eligible(today))
            .min_by(|a, b| (a.created_at(), a.sku()).cmp(&(b.created_at(), b.sku())))
            .map(InventoryItem::id_typed);

        let Some(id) = candidate else {
            return Ok(None);
        };
        let item = self
            .work
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("inventory item {id} vanished")))?;

        let prior_state = item.state();
        item.execute(&InventoryCommand::Allocate(AllocateItem {
            item_id: id,
            occurred_at: now,
        }))
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Some(Claim {
            item: item.clone(),
            prior_state,
        }))
    }

    async fn count_available(
        &mut self,
        products: &[ProductSlug],
        today: NaiveDate,
    ) -> Result<HashMap<ProductSlug, u64>, StoreError> {
        let mut counts = HashMap::new();
        for item in self.work.items.values() {
            if products.contains(item.product()) && item.is_eligible(today) {
                *counts.entry(item.product().clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn inventory_stats(&mut self, today: NaiveDate) -> Result<InventoryStats, StoreError> {
        Ok(InventoryStats::tally(self.work.items.values(), today))
    }

    async fn lock_basket(&mut self, _key: BasketKey) -> Result<(), StoreError> {
        // The transaction already holds the store-wide lock.
        Ok(())
    }

    async fn load_basket(&mut self, key: BasketKey) -> Result<SelectionBasket, StoreError> {
        let slugs = self.work.baskets.get(&key).cloned().unwrap_or_default();
        Ok(SelectionBasket::new(key, slugs))
    }

    async fn add_basket_item(
        &mut self,
        key: BasketKey,
        product: &ProductSlug,
        _added_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let slugs = self.work.baskets.entry(key).or_default();
        if slugs.contains(product) {
            return Err(StoreError::unique(basket_constraint(key)));
        }
        slugs.push(product.clone());
        Ok(())
    }

    async fn remove_basket_item(
        &mut self,
        key: BasketKey,
        product: &ProductSlug,
    ) -> Result<bool, StoreError> {
        let Some(slugs) = self.work.baskets.get_mut(&key) else {
            return Ok(false);
        };
        let before = slugs.len();
        slugs.retain(|s| s != product);
        let removed = slugs.len() != before;
        if slugs.is_empty() {
            self.work.baskets.remove(&key);
        }
        Ok(removed)
    }

    async fn clear_basket(&mut self, key: BasketKey) -> Result<u64, StoreError> {
        Ok(self
            .work
            .baskets
            .remove(&key)
            .map(|slugs| slugs.len() as u64)
            .unwrap_or(0))
    }

    async fn upsert_shipping_details(
        &mut self,
        user: UserId,
        details: &ShippingDetails,
        _now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.work.customers.insert(user, details.clone());
        Ok(())
    }

    async fn load_shipping_details(
        &mut self,
        user: UserId,
    ) -> Result<Option<ShippingDetails>, StoreError> {
        Ok(self.work.customers.get(&user).cloned())
    }

    async fn insert_subscription(&mut self, subscription: &Subscription) -> Result<(), StoreError> {
        if self.work.other_active_subscription(subscription) {
            return Err(StoreError::unique(constraints::ONE_ACTIVE_SUBSCRIPTION));
        }
        if self.work.subscriptions.contains_key(&subscription.id_typed()) {
            return Err(StoreError::unique("subscriptions_pkey"));
        }
        self.work
            .subscriptions
            .insert(subscription.id_typed(), subscription.clone());
        Ok(())
    }

    async fn load_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self.work.subscriptions.get(&id).cloned())
    }

    async fn subscriptions_for_user(
        &mut self,
        user: UserId,
    ) -> Result<Vec<Subscription>, StoreError> {
        Ok(newest_first(
            self.work
                .subscriptions
                .values()
                .filter(|s| s.user_id() == user)
                .cloned()
                .collect(),
        ))
    }

    async fn list_subscriptions(&mut self) -> Result<Vec<Subscription>, StoreError> {
        Ok(newest_first(
            self.work.subscriptions.values().cloned().collect(),
        ))
    }

    async fn update_subscription(
        &mut self,
        subscription: &Subscription,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let id = subscription.id_typed();
        let stored = self
            .work
            .subscriptions
            .get(&id)
            .ok_or_else(|| StoreError::Stale(format!("subscription {id} does not exist")))?;
        check_version("subscription", id, expected, stored.version())?;
        if self.work.other_active_subscription(subscription) {
            return Err(StoreError::unique(constraints::ONE_ACTIVE_SUBSCRIPTION));
        }
        self.work.subscriptions.insert(id, subscription.clone());
        Ok(())
    }

    async fn insert_box(&mut self, rental_box: &RentalBox) -> Result<(), StoreError> {
        if self.work.boxes.values().any(|b| {
            b.subscription_id() == rental_box.subscription_id()
                && b.cycle_number() == rental_box.cycle_number()
        }) {
            return Err(StoreError::unique(constraints::BOX_CYCLE));
        }
        if self.work.other_open_box(rental_box) {
            return Err(StoreError::unique(constraints::ONE_OPEN_BOX));
        }
        self.work
            .boxes
            .insert(rental_box.id_typed(), rental_box.clone());
        Ok(())
    }

    async fn load_box(&mut self, id: BoxId) -> Result<Option<RentalBox>, StoreError> {
        Ok(self.work.boxes.get(&id).cloned())
    }

    async fn boxes_for_subscription(
        &mut self,
        subscription: SubscriptionId,
    ) -> Result<Vec<RentalBox>, StoreError> {
        let mut boxes: Vec<RentalBox> = self
            .work
            .boxes
            .values()
            .filter(|b| b.subscription_id() == subscription)
            .cloned()
            .collect();
        boxes.sort_by_key(RentalBox::cycle_number);
        Ok(boxes)
    }

    async fn update_box(
        &mut self,
        rental_box: &RentalBox,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let id = rental_box.id_typed();
        let stored = self
            .work
            .boxes
            .get(&id)
            .ok_or_else(|| StoreError::Stale(format!("box {id} does not exist")))?;
        check_version("box", id, expected, stored.version())?;
        if self.work.other_open_box(rental_box) {
            return Err(StoreError::unique(constraints::ONE_OPEN_BOX));
        }
        self.work.boxes.insert(id, rental_box.clone());
        Ok(())
    }

    async fn insert_box_item(&mut self, item: &BoxItem) -> Result<(), StoreError> {
        if !self.work.boxes.contains_key(&item.box_id) {
            return Err(StoreError::backend(
                "insert_box_item",
                format!("box {} does not exist", item.box_id),
            ));
        }
        if !self.work.items.contains_key(&item.inventory_item_id) {
            return Err(StoreError::backend(
                "insert_box_item",
                format!("inventory item {} does not exist", item.inventory_item_id),
            ));
        }
        self.work.box_items.push(item.clone());
        Ok(())
    }

    async fn box_items(&mut self, box_id: BoxId) -> Result<Vec<BoxItem>, StoreError> {
        Ok(self
            .work
            .box_items
            .iter()
            .filter(|i| i.box_id == box_id)
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use seasons_core::Sku;
    use seasons_inventory::{InventoryState, RegisterItem};

    fn register(product: &str, sku: &str, at: DateTime<Utc>) -> InventoryItem {
        InventoryItem::register(&RegisterItem {
            item_id: InventoryItemId::new(),
            product: ProductSlug::parse(product).unwrap(),
            sku: Sku::parse(sku).unwrap(),
            condition_notes: None,
            occurred_at: at,
        })
        .unwrap()
        .0
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_item(&register("dress", "D-1", t0())).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_items(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&register("dress", "D-1", t0())).await.unwrap();
        let err = tx
            .insert_item(&register("skirt", "D-1", t0()))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(constraints::SKU));
    }

    #[tokio::test]
    async fn claim_takes_oldest_then_lowest_sku() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let newest = register("dress", "A-9", t0() + Duration::hours(1));
        let tied_b = register("dress", "B-2", t0());
        let tied_a = register("dress", "B-1", t0());
        for item in [&newest, &tied_b, &tied_a] {
            tx.insert_item(item).await.unwrap();
        }

        let slug = ProductSlug::parse("dress").unwrap();
        let order: Vec<_> = [
            tx.claim_one_available(&slug, t0()).await.unwrap(),
            tx.claim_one_available(&slug, t0()).await.unwrap(),
            tx.claim_one_available(&slug, t0()).await.unwrap(),
        ]
        .into_iter()
        .map(|c| c.unwrap().item.sku().as_str().to_string())
        .collect();
        assert_eq!(order, vec!["B-1", "B-2", "A-9"]);

        assert!(tx.claim_one_available(&slug, t0()).await.unwrap().is_none());
        let stats = tx.inventory_stats(t0().date_naive()).await.unwrap();
        assert_eq!(stats.active, 3);
        assert_eq!(stats.available, 0);
    }

    #[tokio::test]
    async fn claim_reports_prior_state() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&register("dress", "D-1", t0())).await.unwrap();
        let slug = ProductSlug::parse("dress").unwrap();

        let claim = tx.claim_one_available(&slug, t0()).await.unwrap().unwrap();
        assert_eq!(claim.prior_state, InventoryState::Available);
        assert_eq!(claim.item.state(), InventoryState::Active);
        assert_eq!(claim.item.version(), 2);
    }
}
