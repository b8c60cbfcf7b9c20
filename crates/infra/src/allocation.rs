//! Allocation: turning a confirmed basket into claimed garments in a box.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seasons_core::{BoxId, BoxItemId, DomainError, DomainResult, InventoryItemId, ProductSlug, Sku};
use seasons_subscriptions::BoxItem;

use crate::error::ServiceResult;
use crate::ledger::claim_in;
use crate::outbox::Outbox;
use crate::store::StoreTx;

/// What to do when some slots of a box cannot be filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Commit the partial box; the shortfall is reported in the result.
    #[default]
    AcceptPartial,
    /// Fail with `OutOfStock` and roll the whole operation back.
    RequireComplete,
}

impl AllocationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationPolicy::AcceptPartial => "accept_partial",
            AllocationPolicy::RequireComplete => "require_complete",
        }
    }
}

impl core::fmt::Display for AllocationPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept_partial" => Ok(AllocationPolicy::AcceptPartial),
            "require_complete" => Ok(AllocationPolicy::RequireComplete),
            other => Err(DomainError::validation(format!(
                "unknown allocation policy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedSlot {
    pub product: ProductSlug,
    pub inventory_item_id: InventoryItemId,
    pub sku: Sku,
    pub box_item_id: BoxItemId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub requested: usize,
    pub allocated: Vec<AllocatedSlot>,
    /// Products with no eligible garment, in basket order.
    pub unfulfilled: Vec<ProductSlug>,
}

impl AllocationResult {
    pub fn is_complete(&self) -> bool {
        self.unfulfilled.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationService {
    policy: AllocationPolicy,
}

impl AllocationService {
    pub fn new(policy: AllocationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Claim one garment per product, in order, into `box_id`.
    ///
    /// Runs inside the caller's transaction; an `Err` means the caller must
    /// not commit.
    pub async fn allocate<T: StoreTx>(
        &self,
        tx: &mut T,
        box_id: BoxId,
        products: &[ProductSlug],
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> ServiceResult<AllocationResult> {
        let mut result = AllocationResult {
            requested: products.len(),
            ..AllocationResult::default()
        };

        for product in products {
            let Some(item) = claim_in(tx, product, now, outbox).await? else {
                tracing::warn!(box_id = %box_id, product = %product, "no eligible garment for slot");
                result.unfulfilled.push(product.clone());
                continue;
            };
            let box_item = BoxItem {
                id: BoxItemId::new(),
                box_id,
                inventory_item_id: item.id_typed(),
                product: product.clone(),
                added_at: now,
            };
            tx.insert_box_item(&box_item).await?;
            result.allocated.push(AllocatedSlot {
                product: product.clone(),
                inventory_item_id: item.id_typed(),
                sku: item.sku().clone(),
                box_item_id: box_item.id,
            });
        }

        self.enforce(&result)?;
        tracing::info!(
            box_id = %box_id,
            allocated = result.allocated.len(),
            unfulfilled = result.unfulfilled.len(),
            "box allocated"
        );
        Ok(result)
    }

    fn enforce(&self, result: &AllocationResult) -> DomainResult<()> {
        if self.policy == AllocationPolicy::RequireComplete && !result.is_complete() {
            let missing: Vec<&str> = result.unfulfilled.iter().map(ProductSlug::as_str).collect();
            return Err(DomainError::out_of_stock(missing.join(", ")));
        }
        Ok(())
    }
}
