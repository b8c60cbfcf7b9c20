//! Integration tests for the rental services over the in-memory store.
//!
//! Tests: basket → checkout → allocation → box progression → swap → return
//!
//! Verifies:
//! - Claims never hand the same garment out twice
//! - Quarantine and swap-window boundaries fall on the right day
//! - Failed operations leave no partial writes behind

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::Value as JsonValue;
    use uuid::Uuid;

    use seasons_core::{Conflict, DomainError, FixedClock, ProductSlug, Resource, Sku, UserId};
    use seasons_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription as BusSubscription};
    use seasons_inventory::InventoryState;
    use seasons_subscriptions::{
        BasketKey, BoxStatus, CyclePolicy, ShippingDetails, SubscriptionStatus,
    };

    use crate::allocation::AllocationPolicy;
    use crate::error::ServiceError;
    use crate::ledger::NewItem;
    use crate::services::RentalServices;
    use crate::store::InMemoryStore;

    type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;

    const LOOK: [&str; 5] = [
        "linen-shirt",
        "wool-coat",
        "silk-scarf",
        "denim-jacket",
        "cashmere-knit",
    ];

    struct Harness {
        services: RentalServices<InMemoryStore, Bus>,
        clock: Arc<FixedClock>,
        bus: Arc<Bus>,
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slug(s: &str) -> ProductSlug {
        ProductSlug::parse(s).unwrap()
    }

    fn setup_with(policy: AllocationPolicy) -> Harness {
        let clock = Arc::new(FixedClock::on(date(2025, 1, 15)));
        let bus = Arc::new(Bus::new());
        let services = RentalServices::new(
            Arc::new(InMemoryStore::new()),
            bus.clone(),
            clock.clone(),
            CyclePolicy::default(),
            policy,
        );
        Harness {
            services,
            clock,
            bus,
        }
    }

    fn setup() -> Harness {
        setup_with(AllocationPolicy::AcceptPartial)
    }

    fn shipping() -> ShippingDetails {
        ShippingDetails::new("1 Garden Row, Bath", Some("+44 1225 000000".into())).unwrap()
    }

    fn domain(err: ServiceError) -> DomainError {
        match err {
            ServiceError::Domain(e) => e,
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    fn drain(sub: &BusSubscription<EventEnvelope<JsonValue>>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(env) = sub.try_recv() {
            types.push(env.event_type().to_string());
        }
        types
    }

    impl Harness {
        async fn stock(&self, product: &str, copies: usize) {
            for _ in 0..copies {
                self.services
                    .ledger
                    .register_item(NewItem {
                        product: slug(product),
                        sku: Sku::parse(format!("{product}-{}", Uuid::now_v7().simple())).unwrap(),
                        condition_notes: None,
                    })
                    .await
                    .unwrap();
            }
        }

        async fn stock_look(&self, copies: usize) {
            for product in LOOK {
                self.stock(product, copies).await;
            }
        }

        async fn fill(&self, key: BasketKey, products: &[&str]) {
            for product in products {
                self.services.baskets.add(key, slug(product)).await.unwrap();
            }
        }

        async fn available(&self, product: &str) -> u64 {
            self.services
                .ledger
                .count_available(&slug(product))
                .await
                .unwrap()
        }

        fn go_to(&self, d: NaiveDate) {
            self.clock.set(d.and_hms_opt(12, 0, 0).unwrap().and_utc());
        }
    }

    #[tokio::test]
    async fn checkout_allocates_a_full_box_and_clears_the_cart() {
        let h = setup();
        let events = h.bus.subscribe();
        h.stock_look(1).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;

        let receipt = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();

        let sub = &receipt.subscription;
        assert_eq!(sub.status(), SubscriptionStatus::Active);
        assert_eq!(sub.cycle_start(), date(2025, 1, 15));
        assert_eq!(sub.cycle_end(), date(2025, 4, 15));
        assert_eq!(sub.next_billing(), date(2025, 4, 15));

        let rental_box = &receipt.rental_box;
        assert_eq!(rental_box.cycle_number(), 1);
        assert_eq!(rental_box.status(), BoxStatus::Confirmed);
        assert_eq!(rental_box.return_by_date(), date(2025, 4, 22));

        assert_eq!(receipt.allocation.requested, 5);
        assert_eq!(receipt.allocation.allocated.len(), 5);
        assert!(receipt.allocation.is_complete());

        assert_eq!(h.services.baskets.count(BasketKey::Cart(user)).await.unwrap(), 0);
        for product in LOOK {
            assert_eq!(h.available(product).await, 0);
        }

        let view = h
            .services
            .cycles
            .current_box(sub.id_typed())
            .await
            .unwrap()
            .expect("box #1 is open");
        assert_eq!(view.items.len(), 5);
        let products: Vec<&str> = view.items.iter().map(|i| i.product.as_str()).collect();
        assert_eq!(products, LOOK);

        let types = drain(&events);
        assert!(types.contains(&"subscription.started".to_string()));
        assert!(types.contains(&"box.confirmed".to_string()));
        assert_eq!(
            types
                .iter()
                .filter(|t| t.as_str() == "inventory.item.allocated")
                .count(),
            5
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_never_share_a_garment() {
        let h = setup();
        h.stock("evening-gown", 3).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = h.services.ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.claim_one_available(&slug("evening-gown")).await
            }));
        }

        let mut claimed = HashSet::new();
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(item) => {
                    assert_eq!(item.state(), InventoryState::Active);
                    assert!(claimed.insert(item.id_typed()), "garment claimed twice");
                }
                Err(err) => {
                    assert!(matches!(domain(err), DomainError::OutOfStock(_)));
                    out_of_stock += 1;
                }
            }
        }
        assert_eq!(claimed.len(), 3);
        assert_eq!(out_of_stock, 1);
    }

    #[tokio::test]
    async fn claims_take_the_oldest_garment_first() {
        let h = setup();
        h.stock("trench-coat", 1).await;
        h.clock.advance_days(1);
        h.stock("trench-coat", 1).await;

        let oldest = h.services.ledger.list_items(Some(&slug("trench-coat"))).await.unwrap()[0]
            .id_typed();
        let claimed = h
            .services
            .ledger
            .claim_one_available(&slug("trench-coat"))
            .await
            .unwrap();
        assert_eq!(claimed.id_typed(), oldest);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_share_out_the_last_garment() {
        let h = setup();
        h.stock("rare-gown", 1).await;
        for product in &LOOK[1..] {
            h.stock(product, 2).await;
        }
        let mut cart = vec!["rare-gown"];
        cart.extend_from_slice(&LOOK[1..]);

        let users = [UserId::new(), UserId::new()];
        for user in users {
            h.fill(BasketKey::Cart(user), &cart).await;
        }

        let mut handles = Vec::new();
        for user in users {
            let cycles = h.services.cycles.clone();
            handles.push(tokio::spawn(async move {
                cycles.create_subscription_from_basket(user, shipping()).await
            }));
        }

        let mut receipts = Vec::new();
        for handle in handles {
            receipts.push(handle.await.unwrap().unwrap());
        }

        let short: Vec<_> = receipts
            .iter()
            .filter(|r| !r.allocation.is_complete())
            .collect();
        assert_eq!(short.len(), 1, "exactly one checkout misses the gown");
        assert_eq!(short[0].allocation.unfulfilled, vec![slug("rare-gown")]);
        assert_eq!(short[0].allocation.allocated.len(), 4);
        assert_eq!(short[0].rental_box.status(), BoxStatus::Confirmed);

        let full = receipts.iter().find(|r| r.allocation.is_complete()).unwrap();
        assert_eq!(full.allocation.allocated.len(), 5);
        assert_eq!(h.available("rare-gown").await, 0);
    }

    #[tokio::test]
    async fn require_complete_rolls_back_the_whole_checkout() {
        let h = setup_with(AllocationPolicy::RequireComplete);
        h.stock_look(1).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;

        let coat = h.services.ledger.list_items(Some(&slug("wool-coat"))).await.unwrap()[0]
            .id_typed();
        h.services
            .ledger
            .retire(coat, "moth damage".into())
            .await
            .unwrap();

        let err = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::OutOfStock("wool-coat".into()));

        let err = h.services.cycles.subscription_for_user(user).await.unwrap_err();
        assert_eq!(domain(err), DomainError::NotFound(Resource::Subscription));
        assert_eq!(h.services.baskets.count(BasketKey::Cart(user)).await.unwrap(), 5);

        let stats = h.services.ledger.stats().await.unwrap();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.available, 4);
        assert_eq!(stats.retired, 1);
    }

    #[tokio::test]
    async fn quarantine_holds_for_five_full_days() {
        let h = setup();
        h.stock("silk-dress", 1).await;
        let item = h
            .services
            .ledger
            .claim_one_available(&slug("silk-dress"))
            .await
            .unwrap();

        // Returned on Jan 15: held through Jan 20, eligible from Jan 21.
        let quarantined = h
            .services
            .ledger
            .transition_state(item.id_typed(), InventoryState::Quarantine, Some("steam".into()))
            .await
            .unwrap();
        assert_eq!(quarantined.quarantine_until(), Some(date(2025, 1, 20)));

        h.go_to(date(2025, 1, 20));
        assert_eq!(h.available("silk-dress").await, 0);
        let err = h
            .services
            .ledger
            .claim_one_available(&slug("silk-dress"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::OutOfStock(_)));

        h.go_to(date(2025, 1, 21));
        assert_eq!(h.available("silk-dress").await, 1);
        let stats = h.services.ledger.stats().await.unwrap();
        assert_eq!(stats.quarantine, 1);
        assert_eq!(stats.quarantine_elapsed, 1);

        let reclaimed = h
            .services
            .ledger
            .claim_one_available(&slug("silk-dress"))
            .await
            .unwrap();
        assert_eq!(reclaimed.id_typed(), item.id_typed());
        assert_eq!(reclaimed.state(), InventoryState::Active);
        assert_eq!(reclaimed.quarantine_until(), None);
    }

    #[tokio::test]
    async fn early_release_from_quarantine_is_rejected() {
        let h = setup();
        h.stock("silk-dress", 1).await;
        let item = h
            .services
            .ledger
            .claim_one_available(&slug("silk-dress"))
            .await
            .unwrap();
        h.services
            .ledger
            .transition_state(item.id_typed(), InventoryState::Quarantine, None)
            .await
            .unwrap();

        let err = h
            .services
            .ledger
            .transition_state(item.id_typed(), InventoryState::Available, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn basket_enforces_duplicates_capacity_and_stock() {
        let h = setup();
        h.stock_look(1).await;
        h.stock("velvet-blazer", 1).await;
        let key = BasketKey::Cart(UserId::new());
        h.fill(key, &LOOK).await;

        let err = h.services.baskets.add(key, slug("wool-coat")).await.unwrap_err();
        assert_eq!(domain(err), DomainError::Conflict(Conflict::DuplicateItem));

        let err = h
            .services
            .baskets
            .add(key, slug("velvet-blazer"))
            .await
            .unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::Conflict(Conflict::BasketFull { capacity: 5 })
        );

        let other = BasketKey::Cart(UserId::new());
        let err = h
            .services
            .baskets
            .add(other, slug("never-stocked"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::OutOfStock(_)));
    }

    #[tokio::test]
    async fn basket_removal_is_idempotent() {
        let h = setup();
        h.stock("linen-shirt", 1).await;
        let key = BasketKey::Cart(UserId::new());
        h.fill(key, &["linen-shirt"]).await;

        assert!(h.services.baskets.remove(key, &slug("linen-shirt")).await.unwrap());
        assert!(!h.services.baskets.remove(key, &slug("linen-shirt")).await.unwrap());
        assert!(!h.services.baskets.remove(key, &slug("never-added")).await.unwrap());
        assert_eq!(h.services.baskets.count(key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn checkout_requires_a_full_cart_and_no_active_plan() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK[..2]).await;

        let err = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::Conflict(Conflict::BasketIncomplete {
                expected: 5,
                actual: 2
            })
        );

        h.fill(BasketKey::Cart(user), &LOOK[2..]).await;
        h.services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();

        h.fill(BasketKey::Cart(user), &LOOK).await;
        let err = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::Conflict(Conflict::AlreadyActive));
    }

    #[tokio::test]
    async fn paused_plan_does_not_block_a_new_checkout() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let old = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap()
            .subscription
            .id_typed();
        h.services.cycles.pause(old).await.unwrap();

        h.fill(BasketKey::Cart(user), &LOOK).await;
        let receipt = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();
        let new = receipt.subscription.id_typed();
        assert_ne!(new, old);
        assert_eq!(receipt.subscription.status(), SubscriptionStatus::Active);
        assert!(receipt.allocation.is_complete());

        // The active plan wins the lookup over the older paused one.
        let current = h.services.cycles.subscription_for_user(user).await.unwrap();
        assert_eq!(current.id_typed(), new);

        // Two active plans are never allowed.
        let err = h.services.cycles.resume(old).await.unwrap_err();
        assert_eq!(domain(err), DomainError::Conflict(Conflict::AlreadyActive));
        let old_plan = h
            .services
            .cycles
            .list_subscriptions()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id_typed() == old)
            .unwrap();
        assert_eq!(old_plan.status(), SubscriptionStatus::Paused);
    }

    #[tokio::test]
    async fn cancelled_plan_does_not_block_a_new_checkout() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let old = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap()
            .subscription
            .id_typed();
        h.services.cycles.cancel(old).await.unwrap();

        h.fill(BasketKey::Cart(user), &LOOK).await;
        let receipt = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();
        assert_eq!(receipt.subscription.status(), SubscriptionStatus::Active);

        let live = h.services.cycles.live_subscription_for_user(user).await.unwrap();
        assert_eq!(live.id_typed(), receipt.subscription.id_typed());
    }

    #[tokio::test]
    async fn swap_window_opens_ten_days_before_cycle_end() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let receipt = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();
        let swap = BasketKey::Swap(receipt.subscription.id_typed());

        // Cycle ends Apr 15.
        h.go_to(date(2025, 4, 4));
        let err = h.services.baskets.add(swap, slug("wool-coat")).await.unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::Conflict(Conflict::WindowClosed {
                days_remaining: 11,
                window_days: 10
            })
        );

        h.go_to(date(2025, 4, 5));
        let basket = h.services.baskets.add(swap, slug("wool-coat")).await.unwrap();
        assert_eq!(basket.len(), 1);
    }

    #[tokio::test]
    async fn confirmed_swap_opens_the_next_cycle() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let checkout = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();
        let sub_id = checkout.subscription.id_typed();
        let first_box = checkout.rental_box.id_typed();

        for status in [BoxStatus::Shipped, BoxStatus::Active] {
            h.services.cycles.advance_box(first_box, status).await.unwrap();
        }

        h.go_to(date(2025, 4, 10));
        let swap = BasketKey::Swap(sub_id);
        h.fill(swap, &LOOK).await;
        let receipt = h.services.cycles.confirm_swap(sub_id).await.unwrap();

        assert_eq!(receipt.rental_box.cycle_number(), 2);
        assert_eq!(receipt.rental_box.start_date(), date(2025, 4, 15));
        assert_eq!(receipt.rental_box.end_date(), date(2025, 7, 15));
        assert_eq!(receipt.rental_box.return_by_date(), date(2025, 7, 22));
        assert!(receipt.allocation.is_complete());

        let previous = receipt.previous_box.expect("box #1 was out");
        assert_eq!(previous.id_typed(), first_box);
        assert_eq!(previous.status(), BoxStatus::SwapPending);

        let sub = h.services.cycles.subscription_for_user(user).await.unwrap();
        assert_eq!(sub.cycle_start(), date(2025, 4, 15));
        assert_eq!(sub.cycle_end(), date(2025, 7, 15));
        assert_eq!(sub.next_billing(), date(2025, 7, 15));

        let current = h.services.cycles.current_box(sub_id).await.unwrap().unwrap();
        assert_eq!(current.rental_box.id_typed(), receipt.rental_box.id_typed());
        assert_eq!(h.services.cycles.box_history(sub_id).await.unwrap().len(), 2);
        assert_eq!(h.services.baskets.count(swap).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn swap_before_delivery_changes_nothing() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let checkout = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();
        let sub_id = checkout.subscription.id_typed();

        h.go_to(date(2025, 4, 10));
        h.fill(BasketKey::Swap(sub_id), &LOOK).await;
        let err = h.services.cycles.confirm_swap(sub_id).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidTransition(_)));

        assert_eq!(h.services.cycles.box_history(sub_id).await.unwrap().len(), 1);
        assert_eq!(h.services.baskets.count(BasketKey::Swap(sub_id)).await.unwrap(), 5);
        for product in LOOK {
            assert_eq!(h.available(product).await, 1);
        }
    }

    #[tokio::test]
    async fn incomplete_swap_selection_is_rejected() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let sub_id = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap()
            .subscription
            .id_typed();

        h.go_to(date(2025, 4, 10));
        h.fill(BasketKey::Swap(sub_id), &LOOK[..3]).await;
        let err = h.services.cycles.confirm_swap(sub_id).await.unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::Conflict(Conflict::IncompleteSelection {
                expected: 5,
                actual: 3
            })
        );
    }

    #[tokio::test]
    async fn returned_boxes_quarantine_their_garments() {
        let h = setup();
        h.stock_look(1).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let checkout = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap();
        let box_id = checkout.rental_box.id_typed();
        for status in [BoxStatus::Shipped, BoxStatus::Active] {
            h.services.cycles.advance_box(box_id, status).await.unwrap();
        }

        h.go_to(date(2025, 4, 20));
        let receipt = h.services.cycles.receive_return(box_id).await.unwrap();
        assert_eq!(receipt.rental_box.status(), BoxStatus::Returned);
        assert_eq!(receipt.quarantined.len(), 5);

        for id in receipt.quarantined {
            let item = h.services.ledger.get_item(id).await.unwrap();
            assert_eq!(item.state(), InventoryState::Quarantine);
            assert_eq!(item.quarantine_until(), Some(date(2025, 4, 25)));
        }
        assert!(h
            .services
            .cycles
            .current_box(checkout.subscription.id_typed())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn return_labels_only_for_boxes_out_with_the_customer() {
        let h = setup();
        h.stock_look(1).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let box_id = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap()
            .rental_box
            .id_typed();

        let label = "https://labels.example.com/rt/123".to_string();
        let err = h
            .services
            .cycles
            .record_return_label(box_id, label.clone())
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));

        h.services.cycles.advance_box(box_id, BoxStatus::Shipped).await.unwrap();
        let updated = h
            .services
            .cycles
            .record_return_label(box_id, label.clone())
            .await
            .unwrap();
        assert_eq!(updated.return_label_url(), Some(label.as_str()));
    }

    #[tokio::test]
    async fn cancelled_plans_cannot_swap() {
        let h = setup();
        h.stock_look(2).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let sub_id = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap()
            .subscription
            .id_typed();

        let cancelled = h.services.cycles.cancel(sub_id).await.unwrap();
        assert_eq!(cancelled.status(), SubscriptionStatus::Cancelled);

        h.go_to(date(2025, 4, 10));
        let err = h
            .services
            .baskets
            .add(BasketKey::Swap(sub_id), slug("wool-coat"))
            .await
            .unwrap_err();
        assert_eq!(domain(err), DomainError::NotFound(Resource::Subscription));

        let err = h.services.cycles.confirm_swap(sub_id).await.unwrap_err();
        assert_eq!(domain(err), DomainError::NotFound(Resource::Subscription));

        let err = h.services.cycles.pause(sub_id).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidTransition(_)));

        let err = h.services.cycles.live_subscription_for_user(user).await.unwrap_err();
        assert_eq!(domain(err), DomainError::NotFound(Resource::Subscription));
    }

    #[tokio::test]
    async fn pause_and_resume_leave_boxes_alone() {
        let h = setup();
        h.stock_look(1).await;
        let user = UserId::new();
        h.fill(BasketKey::Cart(user), &LOOK).await;
        let sub_id = h
            .services
            .cycles
            .create_subscription_from_basket(user, shipping())
            .await
            .unwrap()
            .subscription
            .id_typed();

        let paused = h.services.cycles.pause(sub_id).await.unwrap();
        assert_eq!(paused.status(), SubscriptionStatus::Paused);
        let resumed = h.services.cycles.resume(sub_id).await.unwrap();
        assert_eq!(resumed.status(), SubscriptionStatus::Active);

        let current = h.services.cycles.current_box(sub_id).await.unwrap().unwrap();
        assert_eq!(current.rental_box.status(), BoxStatus::Confirmed);
        assert_eq!(current.items.len(), 5);
    }

    #[tokio::test]
    async fn batch_intake_is_all_or_nothing() {
        let h = setup();
        h.services
            .ledger
            .register_item(NewItem {
                product: slug("wool-coat"),
                sku: Sku::parse("WC-1").unwrap(),
                condition_notes: None,
            })
            .await
            .unwrap();

        let batch = vec![
            NewItem {
                product: slug("linen-shirt"),
                sku: Sku::parse("LS-1").unwrap(),
                condition_notes: Some("new with tags".into()),
            },
            NewItem {
                product: slug("wool-coat"),
                sku: Sku::parse("WC-1").unwrap(),
                condition_notes: None,
            },
        ];
        let err = h.services.ledger.register_batch(batch).await.unwrap_err();
        assert_eq!(
            domain(err),
            DomainError::Conflict(Conflict::DuplicateSku("WC-1".into()))
        );
        assert_eq!(h.available("linen-shirt").await, 0);
        assert_eq!(h.services.ledger.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn availability_reports_zero_for_unknown_products() {
        let h = setup();
        h.stock("linen-shirt", 2).await;

        let counts = h
            .services
            .ledger
            .availability(&[slug("linen-shirt"), slug("never-stocked")])
            .await
            .unwrap();
        assert_eq!(counts[&slug("linen-shirt")], 2);
        assert_eq!(counts[&slug("never-stocked")], 0);
    }
}
