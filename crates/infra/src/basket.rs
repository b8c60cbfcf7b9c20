//! Basket service: the cart before checkout and the swap selection before a
//! swap is confirmed.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use tracing::instrument;

use seasons_core::{Conflict, DomainError, ProductSlug, Resource, SubscriptionId};
use seasons_events::{EventBus, EventEnvelope};
use seasons_subscriptions::{BasketKey, CyclePolicy, SelectionBasket, Subscription};

use crate::error::ServiceResult;
use crate::services::ServiceContext;
use crate::store::{Store, StoreTx};

pub struct BasketService<S, B> {
    ctx: ServiceContext<S, B>,
}

impl<S, B> Clone for BasketService<S, B> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S, B> BasketService<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(ctx: ServiceContext<S, B>) -> Self {
        Self { ctx }
    }

    /// Add `product`, checking duplicate, capacity and stock in that order.
    ///
    /// Swap selections also need a live subscription inside its swap window.
    /// The stock check is advisory; nothing is reserved until allocation.
    #[instrument(skip(self), fields(basket = %key, product = %product), err)]
    pub async fn add(&self, key: BasketKey, product: ProductSlug) -> ServiceResult<SelectionBasket> {
        let now = self.ctx.clock.now();
        let today = now.date_naive();
        let mut tx = self.ctx.begin().await?;

        if let BasketKey::Swap(subscription_id) = key {
            open_swap_subscription(&mut tx, subscription_id, &self.ctx.policy, today).await?;
        }

        tx.lock_basket(key).await?;
        let mut basket = tx.load_basket(key).await?;
        let counts = tx
            .count_available(std::slice::from_ref(&product), today)
            .await?;
        let available = counts.get(&product).copied().unwrap_or(0);
        basket.check_add(&product, self.ctx.policy.box_size, available)?;

        tx.add_basket_item(key, &product, now).await?;
        basket.push(product);
        tx.commit().await?;

        tracing::info!(size = basket.len(), "basket item added");
        Ok(basket)
    }

    /// Idempotent; returns whether anything was removed.
    #[instrument(skip(self), fields(basket = %key, product = %product), err)]
    pub async fn remove(&self, key: BasketKey, product: &ProductSlug) -> ServiceResult<bool> {
        let mut tx = self.ctx.begin().await?;
        tx.lock_basket(key).await?;
        let removed = tx.remove_basket_item(key, product).await?;
        tx.commit().await?;
        Ok(removed)
    }

    #[instrument(skip(self), fields(basket = %key), err)]
    pub async fn clear(&self, key: BasketKey) -> ServiceResult<u64> {
        let mut tx = self.ctx.begin().await?;
        tx.lock_basket(key).await?;
        let cleared = tx.clear_basket(key).await?;
        tx.commit().await?;
        Ok(cleared)
    }

    pub async fn list(&self, key: BasketKey) -> ServiceResult<SelectionBasket> {
        let mut tx = self.ctx.begin().await?;
        let basket = tx.load_basket(key).await?;
        tx.commit().await?;
        Ok(basket)
    }

    pub async fn count(&self, key: BasketKey) -> ServiceResult<usize> {
        Ok(self.list(key).await?.len())
    }
}

/// Load a subscription that can take swap selections today.
async fn open_swap_subscription<T: StoreTx>(
    tx: &mut T,
    id: SubscriptionId,
    policy: &CyclePolicy,
    today: NaiveDate,
) -> ServiceResult<Subscription> {
    let subscription = tx
        .load_subscription(id)
        .await?
        .filter(|s| !s.is_cancelled())
        .ok_or(DomainError::not_found(Resource::Subscription))?;

    if !subscription.swap_window_open(policy, today) {
        return Err(DomainError::conflict(Conflict::WindowClosed {
            days_remaining: subscription.days_remaining(today),
            window_days: policy.swap_window_days,
        })
        .into());
    }
    Ok(subscription)
}
