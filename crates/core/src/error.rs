//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Resource kinds that can be missing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resource {
    InventoryItem,
    Subscription,
    Box,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::InventoryItem => "inventory item",
            Resource::Subscription => "subscription",
            Resource::Box => "box",
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business conflicts a caller can act on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("user already has an active subscription")]
    AlreadyActive,

    #[error("product is already in the basket")]
    DuplicateItem,

    #[error("basket already holds {capacity} items")]
    BasketFull { capacity: usize },

    #[error("checkout needs exactly {expected} items, basket has {actual}")]
    BasketIncomplete { expected: usize, actual: usize },

    #[error("swap needs exactly {expected} items, selection has {actual}")]
    IncompleteSelection { expected: usize, actual: usize },

    #[error("swap window is closed: cycle ends in {days_remaining} days, window opens at {window_days}")]
    WindowClosed { days_remaining: i64, window_days: i64 },

    #[error("sku {0} is already registered")]
    DuplicateSku(String),

    /// Optimistic concurrency check failed.
    #[error("stale write: {0}")]
    Stale(String),
}

/// Domain-level error.
///
/// Deterministic business failures only. Infrastructure concerns belong in
/// the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("{0} not found")]
    NotFound(Resource),

    #[error("conflict: {0}")]
    Conflict(Conflict),

    /// No eligible inventory item exists for the product.
    #[error("out of stock: {0}")]
    OutOfStock(String),

    /// A state machine edge that does not exist was requested.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(conflict: Conflict) -> Self {
        Self::Conflict(conflict)
    }

    pub fn stale(msg: impl Into<String>) -> Self {
        Self::Conflict(Conflict::Stale(msg.into()))
    }

    pub fn not_found(resource: Resource) -> Self {
        Self::NotFound(resource)
    }

    pub fn out_of_stock(product: impl core::fmt::Display) -> Self {
        Self::OutOfStock(product.to_string())
    }

    pub fn invalid_transition(
        entity: &str,
        from: impl core::fmt::Display,
        to: impl core::fmt::Display,
    ) -> Self {
        Self::InvalidTransition(format!("{entity} cannot move from {from} to {to}"))
    }

    /// Stable snake_case code for API bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_failed",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound(Resource::Subscription) => "no_subscription",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(c) => match c {
                Conflict::AlreadyActive => "already_active",
                Conflict::DuplicateItem => "duplicate_item",
                Conflict::BasketFull { .. } => "basket_full",
                Conflict::BasketIncomplete { .. } => "basket_incomplete",
                Conflict::IncompleteSelection { .. } => "incomplete_selection",
                Conflict::WindowClosed { .. } => "window_closed",
                Conflict::DuplicateSku(_) => "duplicate_sku",
                Conflict::Stale(_) => "conflict",
            },
            DomainError::OutOfStock(_) => "out_of_stock",
            DomainError::InvalidTransition(_) => "invalid_transition",
            DomainError::Unauthorized => "unauthorized",
        }
    }
}
