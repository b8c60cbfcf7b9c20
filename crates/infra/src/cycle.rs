//! Cycle manager: checkout, swaps, subscription status and box progression.
//!
//! Each operation is one store transaction. Checkout, for instance, writes
//! shipping details, the subscription, box #1, every claim and the cleared
//! cart together, or nothing at all.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::instrument;

use seasons_core::{
    Aggregate, AggregateRoot, BoxId, Conflict, DomainError, ExpectedVersion, InventoryItemId,
    Resource, SubscriptionId, UserId,
};
use seasons_events::{EventBus, EventEnvelope};
use seasons_inventory::{InventoryCommand, InventoryState, TransitionState};
use seasons_subscriptions::{
    AdvanceBox, AdvanceCycle, BasketKey, BoxCommand, BoxItem, BoxStatus, ChangeStatus,
    CyclePolicy, OpenBox, RecordReturnLabel, RentalBox, ShippingDetails, StartSubscription,
    Subscription, SubscriptionCommand, SubscriptionStatus,
};

use crate::allocation::{AllocationPolicy, AllocationResult, AllocationService};
use crate::error::ServiceResult;
use crate::ledger::execute_in;
use crate::outbox::{Outbox, RENTAL_BOX, SUBSCRIPTION};
use crate::services::ServiceContext;
use crate::store::{Store, StoreTx};

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub subscription: Subscription,
    pub rental_box: RentalBox,
    pub allocation: AllocationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapReceipt {
    pub rental_box: RentalBox,
    /// The box that was out with the customer, now `swap_pending`.
    pub previous_box: Option<RentalBox>,
    pub allocation: AllocationResult,
}

/// A box with the garments allocated to it.
#[derive(Debug, Clone, Serialize)]
pub struct BoxView {
    pub rental_box: RentalBox,
    pub items: Vec<BoxItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub rental_box: RentalBox,
    pub quarantined: Vec<InventoryItemId>,
}

pub struct CycleManager<S, B> {
    ctx: ServiceContext<S, B>,
    allocation: AllocationService,
}

impl<S, B> Clone for CycleManager<S, B> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            allocation: self.allocation,
        }
    }
}

impl<S, B> CycleManager<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(ctx: ServiceContext<S, B>, allocation: AllocationService) -> Self {
        Self { ctx, allocation }
    }

    pub fn policy(&self) -> CyclePolicy {
        self.ctx.policy
    }

    pub fn allocation_policy(&self) -> AllocationPolicy {
        self.allocation.policy()
    }

    /// Checkout: start a subscription from the user's full cart.
    #[instrument(skip(self, shipping), fields(user_id = %user, subscription_id = tracing::field::Empty), err)]
    pub async fn create_subscription_from_basket(
        &self,
        user: UserId,
        shipping: ShippingDetails,
    ) -> ServiceResult<CheckoutReceipt> {
        let now = self.ctx.clock.now();
        let policy = self.ctx.policy;
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let existing = tx.subscriptions_for_user(user).await?;
        if existing.iter().any(|s| s.status() == SubscriptionStatus::Active) {
            return Err(DomainError::conflict(Conflict::AlreadyActive).into());
        }

        let cart = BasketKey::Cart(user);
        tx.lock_basket(cart).await?;
        let basket = tx.load_basket(cart).await?;
        basket.ensure_complete(policy.box_size)?;

        tx.upsert_shipping_details(user, &shipping, now).await?;

        let dates = policy.cycle_starting(now.date_naive())?;
        let (subscription, started) = Subscription::start(&StartSubscription {
            subscription_id: SubscriptionId::new(),
            user_id: user,
            dates,
            occurred_at: now,
        });
        tx.insert_subscription(&subscription).await?;
        outbox.record(
            SUBSCRIPTION,
            *subscription.id_typed().as_uuid(),
            subscription.version(),
            &started,
        )?;
        tracing::Span::current().record(
            "subscription_id",
            tracing::field::display(subscription.id_typed()),
        );

        let (rental_box, confirmed) = RentalBox::open(&OpenBox {
            box_id: BoxId::new(),
            subscription_id: subscription.id_typed(),
            cycle_number: 1,
            dates,
            occurred_at: now,
        })?;
        tx.insert_box(&rental_box).await?;
        outbox.record(
            RENTAL_BOX,
            *rental_box.id_typed().as_uuid(),
            rental_box.version(),
            &confirmed,
        )?;

        let allocation = self
            .allocation
            .allocate(&mut tx, rental_box.id_typed(), basket.slugs(), now, &mut outbox)
            .await?;
        tx.clear_basket(cart).await?;

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(
            box_id = %rental_box.id_typed(),
            cycle_end = %subscription.cycle_end(),
            "subscription started"
        );
        Ok(CheckoutReceipt {
            subscription,
            rental_box,
            allocation,
        })
    }

    /// Confirm the swap selection as the next cycle's box.
    ///
    /// The box currently with the customer must be `active`; it moves to
    /// `swap_pending` and the subscription moves onto the new cycle's dates.
    #[instrument(skip(self), fields(subscription_id = %id), err)]
    pub async fn confirm_swap(&self, id: SubscriptionId) -> ServiceResult<SwapReceipt> {
        let now = self.ctx.clock.now();
        let policy = self.ctx.policy;
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut subscription = tx
            .load_subscription(id)
            .await?
            .filter(|s| !s.is_cancelled())
            .ok_or(DomainError::not_found(Resource::Subscription))?;

        let selection = BasketKey::Swap(id);
        tx.lock_basket(selection).await?;
        let basket = tx.load_basket(selection).await?;
        basket.ensure_complete(policy.box_size)?;

        let boxes = tx.boxes_for_subscription(id).await?;
        let cycle_number = u32::try_from(boxes.len())
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| DomainError::validation("cycle number out of range"))?;

        let previous_box = match boxes.into_iter().find(RentalBox::is_open) {
            Some(mut open) => {
                advance_in(&mut tx, &mut open, BoxStatus::SwapPending, now, &mut outbox).await?;
                Some(open)
            }
            None => None,
        };

        let dates = policy.cycle_starting(subscription.cycle_end())?;
        let expected = ExpectedVersion::Exact(subscription.version());
        let events = subscription.execute(&SubscriptionCommand::AdvanceCycle(AdvanceCycle {
            subscription_id: id,
            dates,
            occurred_at: now,
        }))?;
        tx.update_subscription(&subscription, expected).await?;
        for event in &events {
            outbox.record(SUBSCRIPTION, *id.as_uuid(), subscription.version(), event)?;
        }

        let (rental_box, confirmed) = RentalBox::open(&OpenBox {
            box_id: BoxId::new(),
            subscription_id: id,
            cycle_number,
            dates,
            occurred_at: now,
        })?;
        tx.insert_box(&rental_box).await?;
        outbox.record(
            RENTAL_BOX,
            *rental_box.id_typed().as_uuid(),
            rental_box.version(),
            &confirmed,
        )?;

        let allocation = self
            .allocation
            .allocate(&mut tx, rental_box.id_typed(), basket.slugs(), now, &mut outbox)
            .await?;
        tx.clear_basket(selection).await?;

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(
            box_id = %rental_box.id_typed(),
            cycle_number,
            "swap confirmed"
        );
        Ok(SwapReceipt {
            rental_box,
            previous_box,
            allocation,
        })
    }

    #[instrument(skip(self), fields(subscription_id = %id), err)]
    pub async fn pause(&self, id: SubscriptionId) -> ServiceResult<Subscription> {
        let command = SubscriptionCommand::Pause(self.status_change(id));
        self.change_status(id, command).await
    }

    /// Fails with `AlreadyActive` if the user has started another active plan.
    #[instrument(skip(self), fields(subscription_id = %id), err)]
    pub async fn resume(&self, id: SubscriptionId) -> ServiceResult<Subscription> {
        let command = SubscriptionCommand::Resume(self.status_change(id));
        self.change_status(id, command).await
    }

    #[instrument(skip(self), fields(subscription_id = %id), err)]
    pub async fn cancel(&self, id: SubscriptionId) -> ServiceResult<Subscription> {
        let command = SubscriptionCommand::Cancel(self.status_change(id));
        self.change_status(id, command).await
    }

    /// The user's active subscription, else their newest paused one, else
    /// their most recent one.
    pub async fn subscription_for_user(&self, user: UserId) -> ServiceResult<Subscription> {
        let mut tx = self.ctx.begin().await?;
        let subscriptions = tx.subscriptions_for_user(user).await?;
        tx.commit().await?;

        let pick = subscriptions
            .iter()
            .position(|s| s.status() == SubscriptionStatus::Active)
            .or_else(|| subscriptions.iter().position(|s| !s.is_cancelled()))
            .unwrap_or(0);
        subscriptions
            .into_iter()
            .nth(pick)
            .ok_or_else(|| DomainError::not_found(Resource::Subscription).into())
    }

    /// The user's non-cancelled subscription.
    pub async fn live_subscription_for_user(&self, user: UserId) -> ServiceResult<Subscription> {
        let subscription = self.subscription_for_user(user).await?;
        if subscription.is_cancelled() {
            return Err(DomainError::not_found(Resource::Subscription).into());
        }
        Ok(subscription)
    }

    /// Newest first.
    pub async fn list_subscriptions(&self) -> ServiceResult<Vec<Subscription>> {
        let mut tx = self.ctx.begin().await?;
        let subscriptions = tx.list_subscriptions().await?;
        tx.commit().await?;
        Ok(subscriptions)
    }

    /// The subscription's open box, if it has one.
    pub async fn current_box(&self, id: SubscriptionId) -> ServiceResult<Option<BoxView>> {
        let mut tx = self.ctx.begin().await?;
        let current = tx
            .boxes_for_subscription(id)
            .await?
            .into_iter()
            .find(RentalBox::is_open);
        let view = match current {
            Some(rental_box) => {
                let items = tx.box_items(rental_box.id_typed()).await?;
                Some(BoxView { rental_box, items })
            }
            None => None,
        };
        tx.commit().await?;
        Ok(view)
    }

    /// Every box of the subscription, by cycle number.
    pub async fn box_history(&self, id: SubscriptionId) -> ServiceResult<Vec<BoxView>> {
        let mut tx = self.ctx.begin().await?;
        let boxes = tx.boxes_for_subscription(id).await?;
        let mut views = Vec::with_capacity(boxes.len());
        for rental_box in boxes {
            let items = tx.box_items(rental_box.id_typed()).await?;
            views.push(BoxView { rental_box, items });
        }
        tx.commit().await?;
        Ok(views)
    }

    /// Fulfilment progression (`confirmed → shipped → active`, …).
    ///
    /// Moving a box to `returned` quarantines its garments, as
    /// [`Self::receive_return`] does.
    #[instrument(skip(self), fields(box_id = %id, to = %to), err)]
    pub async fn advance_box(&self, id: BoxId, to: BoxStatus) -> ServiceResult<RentalBox> {
        if to == BoxStatus::Returned {
            return Ok(self.receive_return(id).await?.rental_box);
        }

        let now = self.ctx.clock.now();
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut rental_box = load_box(&mut tx, id).await?;
        advance_in(&mut tx, &mut rental_box, to, now, &mut outbox).await?;

        self.ctx.finish(tx, outbox).await?;
        Ok(rental_box)
    }

    /// Return intake: the box becomes `returned` and every garment still
    /// out with it enters quarantine.
    #[instrument(skip(self), fields(box_id = %id), err)]
    pub async fn receive_return(&self, id: BoxId) -> ServiceResult<ReturnReceipt> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut rental_box = load_box(&mut tx, id).await?;
        advance_in(&mut tx, &mut rental_box, BoxStatus::Returned, now, &mut outbox).await?;

        let mut quarantined = Vec::new();
        for box_item in tx.box_items(id).await? {
            let Some(mut item) = tx.load_item(box_item.inventory_item_id).await? else {
                continue;
            };
            if !matches!(item.state(), InventoryState::Active | InventoryState::InTransit) {
                continue;
            }
            let command = InventoryCommand::TransitionState(TransitionState {
                item_id: box_item.inventory_item_id,
                to: InventoryState::Quarantine,
                notes: None,
                occurred_at: now,
            });
            execute_in(&mut tx, &mut item, &command, &mut outbox).await?;
            quarantined.push(box_item.inventory_item_id);
        }

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(quarantined = quarantined.len(), "box returned");
        Ok(ReturnReceipt {
            rental_box,
            quarantined,
        })
    }

    #[instrument(skip(self, url), fields(box_id = %id), err)]
    pub async fn record_return_label(&self, id: BoxId, url: String) -> ServiceResult<RentalBox> {
        let now = self.ctx.clock.now();
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut rental_box = load_box(&mut tx, id).await?;
        let command = BoxCommand::RecordReturnLabel(RecordReturnLabel {
            box_id: id,
            url,
            occurred_at: now,
        });
        execute_box(&mut tx, &mut rental_box, &command, &mut outbox).await?;

        self.ctx.finish(tx, outbox).await?;
        Ok(rental_box)
    }

    fn status_change(&self, id: SubscriptionId) -> ChangeStatus {
        ChangeStatus {
            subscription_id: id,
            occurred_at: self.ctx.clock.now(),
        }
    }

    async fn change_status(
        &self,
        id: SubscriptionId,
        command: SubscriptionCommand,
    ) -> ServiceResult<Subscription> {
        let mut tx = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let mut subscription = tx
            .load_subscription(id)
            .await?
            .ok_or(DomainError::not_found(Resource::Subscription))?;
        let from = subscription.status();
        let expected = ExpectedVersion::Exact(subscription.version());
        let events = subscription.execute(&command)?;
        tx.update_subscription(&subscription, expected).await?;
        for event in &events {
            outbox.record(SUBSCRIPTION, *id.as_uuid(), subscription.version(), event)?;
        }

        self.ctx.finish(tx, outbox).await?;
        tracing::info!(from = %from, to = %subscription.status(), "subscription status changed");
        Ok(subscription)
    }
}

async fn load_box<T: StoreTx>(tx: &mut T, id: BoxId) -> ServiceResult<RentalBox> {
    Ok(tx
        .load_box(id)
        .await?
        .ok_or(DomainError::not_found(Resource::Box))?)
}

async fn advance_in<T: StoreTx>(
    tx: &mut T,
    rental_box: &mut RentalBox,
    to: BoxStatus,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> ServiceResult<()> {
    let command = BoxCommand::Advance(AdvanceBox {
        box_id: rental_box.id_typed(),
        to,
        occurred_at: now,
    });
    execute_box(tx, rental_box, &command, outbox).await
}

async fn execute_box<T: StoreTx>(
    tx: &mut T,
    rental_box: &mut RentalBox,
    command: &BoxCommand,
    outbox: &mut Outbox,
) -> ServiceResult<()> {
    let expected = ExpectedVersion::Exact(rental_box.version());
    let events = rental_box.execute(command)?;
    tx.update_box(rental_box, expected).await?;
    for event in &events {
        outbox.record(
            RENTAL_BOX,
            *rental_box.id_typed().as_uuid(),
            rental_box.version(),
            event,
        )?;
    }
    Ok(())
}
