use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use seasons_core::{
    BoxId, ExpectedVersion, InventoryItemId, ProductSlug, SubscriptionId, UserId,
};
use seasons_inventory::{InventoryItem, InventoryState, InventoryStats};
use seasons_subscriptions::{
    BasketKey, BoxItem, RentalBox, SelectionBasket, ShippingDetails, Subscription,
};

/// Storage failures.
///
/// Business-meaningful cases (unique constraints, stale versions) are kept
/// distinct so services can turn them into domain conflicts.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Optimistic concurrency failure.
    #[error("stale write: {0}")]
    Stale(String),

    /// A stored row does not decode into a valid domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("backend failure in {operation}: {message}")]
    Backend { operation: String, message: String },
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn backend(operation: &str, message: impl core::fmt::Display) -> Self {
        Self::Backend {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_unique_violation(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

/// Result of an atomic claim: the item after the move to `active`, plus the
/// state it was claimed from (`available`, or an elapsed `quarantine`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub item: InventoryItem,
    pub prior_state: InventoryState,
}

/// Transactional store.
///
/// Every service operation runs inside exactly one [`StoreTx`]. Dropping a
/// transaction without [`StoreTx::commit`] rolls it back.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}

/// Operations available inside one transaction.
#[async_trait]
pub trait StoreTx: Send {
    // ── inventory ──────────────────────────────────────────────────────────

    async fn insert_item(&mut self, item: &InventoryItem) -> Result<(), StoreError>;

    async fn load_item(&mut self, id: InventoryItemId) -> Result<Option<InventoryItem>, StoreError>;

    /// Persist `item`; `expected` is the version it was loaded at.
    async fn update_item(
        &mut self,
        item: &InventoryItem,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// Oldest first.
    async fn list_items(
        &mut self,
        product: Option<&ProductSlug>,
    ) -> Result<Vec<InventoryItem>, StoreError>;

    /// Atomically pick the oldest eligible item of `product` (SKU breaks
    /// ties) and move it to `active`.
    ///
    /// Two concurrent claims never return the same item.
    async fn claim_one_available(
        &mut self,
        product: &ProductSlug,
        now: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError>;

    /// Eligible counts for each requested product in one pass. Products with
    /// no eligible items may be absent from the map.
    async fn count_available(
        &mut self,
        products: &[ProductSlug],
        today: NaiveDate,
    ) -> Result<HashMap<ProductSlug, u64>, StoreError>;

    async fn inventory_stats(&mut self, today: NaiveDate) -> Result<InventoryStats, StoreError>;

    // ── baskets ────────────────────────────────────────────────────────────

    /// Serialize writers of one basket until this transaction ends.
    async fn lock_basket(&mut self, key: BasketKey) -> Result<(), StoreError>;

    async fn load_basket(&mut self, key: BasketKey) -> Result<SelectionBasket, StoreError>;

    async fn add_basket_item(
        &mut self,
        key: BasketKey,
        product: &ProductSlug,
        added_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    async fn remove_basket_item(
        &mut self,
        key: BasketKey,
        product: &ProductSlug,
    ) -> Result<bool, StoreError>;

    /// Returns the number of removed rows.
    async fn clear_basket(&mut self, key: BasketKey) -> Result<u64, StoreError>;

    // ── customers ──────────────────────────────────────────────────────────

    async fn upsert_shipping_details(
        &mut self,
        user: UserId,
        details: &ShippingDetails,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn load_shipping_details(
        &mut self,
        user: UserId,
    ) -> Result<Option<ShippingDetails>, StoreError>;

    // ── subscriptions ──────────────────────────────────────────────────────

    async fn insert_subscription(&mut self, subscription: &Subscription) -> Result<(), StoreError>;

    async fn load_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Newest first.
    async fn subscriptions_for_user(&mut self, user: UserId)
    -> Result<Vec<Subscription>, StoreError>;

    /// Newest first.
    async fn list_subscriptions(&mut self) -> Result<Vec<Subscription>, StoreError>;

    async fn update_subscription(
        &mut self,
        subscription: &Subscription,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    // ── boxes ──────────────────────────────────────────────────────────────

    async fn insert_box(&mut self, rental_box: &RentalBox) -> Result<(), StoreError>;

    async fn load_box(&mut self, id: BoxId) -> Result<Option<RentalBox>, StoreError>;

    /// Ordered by cycle number.
    async fn boxes_for_subscription(
        &mut self,
        subscription: SubscriptionId,
    ) -> Result<Vec<RentalBox>, StoreError>;

    async fn update_box(
        &mut self,
        rental_box: &RentalBox,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    async fn insert_box_item(&mut self, item: &BoxItem) -> Result<(), StoreError>;

    /// In allocation order.
    async fn box_items(&mut self, box_id: BoxId) -> Result<Vec<BoxItem>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
