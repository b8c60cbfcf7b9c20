//! Request/response bodies. Domain aggregates are flattened into plain JSON
//! here so handlers stay thin.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use seasons_core::{BoxId, BoxItemId, InventoryItemId, SubscriptionId, UserId};
use seasons_infra::{AllocationResult, BoxView, CheckoutReceipt, ReturnReceipt, SwapReceipt};
use seasons_inventory::InventoryItem;
use seasons_subscriptions::{BoxItem, CyclePolicy, RentalBox, SelectionBasket, Subscription};

// ---------------- Requests ----------------

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_slug: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub product_slug: String,
    pub sku: String,
    #[serde(default)]
    pub condition_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    #[serde(default)]
    pub product: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub state: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RetireRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceBoxRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ReturnLabelRequest {
    pub url: String,
}

/// `?slugs=a,b,c`
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub slugs: String,
}

// ---------------- Responses ----------------

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub cleared: u64,
}

#[derive(Debug, Serialize)]
pub struct BasketResponse {
    pub kind: &'static str,
    pub items: Vec<String>,
    pub count: usize,
    pub capacity: usize,
}

impl BasketResponse {
    pub fn from_basket(basket: &SelectionBasket, capacity: usize) -> Self {
        let kind = match basket.key().kind() {
            seasons_subscriptions::BasketKind::Cart => "cart",
            seasons_subscriptions::BasketKind::Swap => "swap",
        };
        Self {
            kind,
            items: basket.slugs().iter().map(|s| s.to_string()).collect(),
            count: basket.len(),
            capacity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub status: String,
    pub cycle_start_date: NaiveDate,
    pub cycle_end_date: NaiveDate,
    pub next_billing_date: NaiveDate,
    pub days_remaining: i64,
    pub swap_window_open: bool,
    pub swap_window_opens_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionResponse {
    pub fn from_subscription(sub: &Subscription, policy: &CyclePolicy, today: NaiveDate) -> Self {
        Self {
            id: sub.id_typed(),
            user_id: sub.user_id(),
            status: sub.status().to_string(),
            cycle_start_date: sub.cycle_start(),
            cycle_end_date: sub.cycle_end(),
            next_billing_date: sub.next_billing(),
            days_remaining: sub.days_remaining(today),
            swap_window_open: sub.swap_window_open(policy, today),
            swap_window_opens_on: policy.swap_window_opens_on(sub.cycle_end()),
            created_at: sub.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoxItemResponse {
    pub id: BoxItemId,
    pub inventory_item_id: InventoryItemId,
    pub product_slug: String,
    pub added_at: DateTime<Utc>,
}

impl From<&BoxItem> for BoxItemResponse {
    fn from(item: &BoxItem) -> Self {
        Self {
            id: item.id,
            inventory_item_id: item.inventory_item_id,
            product_slug: item.product.to_string(),
            added_at: item.added_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoxResponse {
    pub id: BoxId,
    pub subscription_id: SubscriptionId,
    pub cycle_number: u32,
    pub status: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub return_by_date: NaiveDate,
    pub return_label_url: Option<String>,
    /// Absent when only the box row was touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<BoxItemResponse>>,
}

impl BoxResponse {
    pub fn from_box(b: &RentalBox) -> Self {
        Self {
            id: b.id_typed(),
            subscription_id: b.subscription_id(),
            cycle_number: b.cycle_number(),
            status: b.status().to_string(),
            start_date: b.start_date(),
            end_date: b.end_date(),
            return_by_date: b.return_by_date(),
            return_label_url: b.return_label_url().map(str::to_string),
            items: None,
        }
    }

    pub fn from_view(view: &BoxView) -> Self {
        Self {
            items: Some(view.items.iter().map(BoxItemResponse::from).collect()),
            ..Self::from_box(&view.rental_box)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentBoxResponse {
    #[serde(rename = "box")]
    pub current: Option<BoxResponse>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub subscription: SubscriptionResponse,
    #[serde(rename = "box")]
    pub rental_box: BoxResponse,
    pub allocation: AllocationResult,
}

impl CheckoutResponse {
    pub fn from_receipt(receipt: &CheckoutReceipt, policy: &CyclePolicy, today: NaiveDate) -> Self {
        Self {
            subscription: SubscriptionResponse::from_subscription(&receipt.subscription, policy, today),
            rental_box: BoxResponse::from_box(&receipt.rental_box),
            allocation: receipt.allocation.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SwapResponse {
    #[serde(rename = "box")]
    pub rental_box: BoxResponse,
    pub previous_box: Option<BoxResponse>,
    pub allocation: AllocationResult,
}

impl From<&SwapReceipt> for SwapResponse {
    fn from(receipt: &SwapReceipt) -> Self {
        Self {
            rental_box: BoxResponse::from_box(&receipt.rental_box),
            previous_box: receipt.previous_box.as_ref().map(BoxResponse::from_box),
            allocation: receipt.allocation.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    #[serde(rename = "box")]
    pub rental_box: BoxResponse,
    pub quarantined: Vec<InventoryItemId>,
}

impl From<&ReturnReceipt> for ReturnResponse {
    fn from(receipt: &ReturnReceipt) -> Self {
        Self {
            rental_box: BoxResponse::from_box(&receipt.rental_box),
            quarantined: receipt.quarantined.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InventoryItemResponse {
    pub id: InventoryItemId,
    pub product_slug: String,
    pub sku: String,
    pub state: String,
    pub condition_notes: Option<String>,
    pub quarantine_until: Option<NaiveDate>,
    pub retirement_reason: Option<String>,
    /// Whether the garment could be claimed today.
    pub eligible: bool,
    pub created_at: DateTime<Utc>,
}

impl InventoryItemResponse {
    pub fn from_item(item: &InventoryItem, today: NaiveDate) -> Self {
        Self {
            id: item.id_typed(),
            product_slug: item.product().to_string(),
            sku: item.sku().to_string(),
            state: item.state().to_string(),
            condition_notes: item.snapshot().condition_notes.clone(),
            quarantine_until: item.quarantine_until(),
            retirement_reason: item.retirement_reason().map(str::to_string),
            eligible: item.is_eligible(today),
            created_at: item.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub availability: BTreeMap<String, u64>,
}
