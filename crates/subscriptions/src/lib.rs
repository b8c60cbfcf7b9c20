//! Subscription-cycle domain: subscriptions, per-cycle boxes, selection
//! baskets and the calendar rules that tie them together.
//!
//! Pure, deterministic logic (no IO). Transactions and allocation are
//! orchestrated by `seasons-infra`.

pub mod basket;
pub mod customer;
pub mod rental_box;
pub mod schedule;
pub mod subscription;

pub use basket::{BasketKey, BasketKind, SelectionBasket};
pub use customer::ShippingDetails;
pub use rental_box::{
    AdvanceBox, BoxCommand, BoxConfirmed, BoxEvent, BoxItem, BoxStatus, BoxStatusChanged, OpenBox,
    RecordReturnLabel, RentalBox, RentalBoxSnapshot, ReturnLabelRecorded,
};
pub use schedule::{CycleDates, CyclePolicy};
pub use subscription::{
    AdvanceCycle, ChangeStatus, CycleAdvanced, StartSubscription, Subscription,
    SubscriptionCommand, SubscriptionEvent, SubscriptionSnapshot, SubscriptionStarted,
    SubscriptionStatus, SubscriptionStatusChanged,
};
