//! Service-level error type.
//!
//! Domain failures pass through unchanged. Storage failures that carry
//! business meaning (unique indexes, stale versions) are folded into the
//! matching [`DomainError`]; everything else stays a [`StoreError`].

use thiserror::Error;

use seasons_core::{Conflict, DomainError};

use crate::store::{StoreError, constraints};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store failure: {0}")]
    Store(StoreError),

    /// An event could not be encoded for publication.
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Stable snake_case code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(e) => e.code(),
            ServiceError::Store(_) => "store_error",
            ServiceError::Encode(_) => "encode_error",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Stale(msg) => DomainError::stale(msg).into(),
            StoreError::UniqueViolation { constraint } => match constraint.as_str() {
                constraints::ONE_ACTIVE_SUBSCRIPTION => {
                    DomainError::conflict(Conflict::AlreadyActive).into()
                }
                constraints::ONE_OPEN_BOX | constraints::BOX_CYCLE => {
                    DomainError::stale("concurrent swap for the same subscription").into()
                }
                constraints::CART_ITEM | constraints::SWAP_ITEM => {
                    DomainError::conflict(Conflict::DuplicateItem).into()
                }
                _ => ServiceError::Store(StoreError::UniqueViolation { constraint }),
            },
            other => ServiceError::Store(other),
        }
    }
}
