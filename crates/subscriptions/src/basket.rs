//! Selection baskets: the pending 5-item choice before checkout or swap.

use serde::{Deserialize, Serialize};

use seasons_core::{Conflict, DomainError, DomainResult, ProductSlug, SubscriptionId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasketKind {
    /// Pre-subscription cart, owned by a user.
    Cart,
    /// Next-cycle selection, owned by a subscription.
    Swap,
}

/// Owner of a basket.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "owner", rename_all = "snake_case")]
pub enum BasketKey {
    Cart(UserId),
    Swap(SubscriptionId),
}

impl BasketKey {
    pub fn kind(&self) -> BasketKind {
        match self {
            BasketKey::Cart(_) => BasketKind::Cart,
            BasketKey::Swap(_) => BasketKind::Swap,
        }
    }

    /// Stable string used for advisory locks and logs.
    pub fn lock_key(&self) -> String {
        match self {
            BasketKey::Cart(user) => format!("cart:{user}"),
            BasketKey::Swap(subscription) => format!("swap:{subscription}"),
        }
    }
}

impl core::fmt::Display for BasketKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.lock_key())
    }
}

/// A loaded basket: unique slugs in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionBasket {
    key: BasketKey,
    slugs: Vec<ProductSlug>,
}

impl SelectionBasket {
    pub fn new(key: BasketKey, slugs: Vec<ProductSlug>) -> Self {
        Self { key, slugs }
    }

    pub fn key(&self) -> BasketKey {
        self.key
    }

    pub fn slugs(&self) -> &[ProductSlug] {
        &self.slugs
    }

    pub fn into_slugs(self) -> Vec<ProductSlug> {
        self.slugs
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    pub fn contains(&self, slug: &ProductSlug) -> bool {
        self.slugs.contains(slug)
    }

    /// Rules for adding `slug`, checked in order: duplicate, capacity, stock.
    ///
    /// `available` is the current eligible count for the product. The check
    /// is advisory: nothing is reserved until checkout.
    pub fn check_add(&self, slug: &ProductSlug, capacity: usize, available: u64) -> DomainResult<()> {
        if self.contains(slug) {
            return Err(DomainError::conflict(Conflict::DuplicateItem));
        }
        if self.len() >= capacity {
            return Err(DomainError::conflict(Conflict::BasketFull { capacity }));
        }
        if available == 0 {
            return Err(DomainError::out_of_stock(slug));
        }
        Ok(())
    }

    /// Add after [`Self::check_add`] passed.
    pub fn push(&mut self, slug: ProductSlug) {
        if !self.contains(&slug) {
            self.slugs.push(slug);
        }
    }

    /// Idempotent removal; returns whether the slug was present.
    pub fn remove(&mut self, slug: &ProductSlug) -> bool {
        let before = self.slugs.len();
        self.slugs.retain(|s| s != slug);
        before != self.slugs.len()
    }

    /// Checkout precondition.
    pub fn ensure_complete(&self, box_size: usize) -> DomainResult<()> {
        if self.len() == box_size {
            return Ok(());
        }
        let conflict = match self.key.kind() {
            BasketKind::Cart => Conflict::BasketIncomplete {
                expected: box_size,
                actual: self.len(),
            },
            BasketKind::Swap => Conflict::IncompleteSelection {
                expected: box_size,
                actual: self.len(),
            },
        };
        Err(DomainError::conflict(conflict))
    }
}
