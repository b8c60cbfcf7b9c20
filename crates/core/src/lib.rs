//! `seasons-core`: domain foundation building blocks for the rental platform.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{Conflict, DomainError, DomainResult, Resource};
pub use id::{BoxId, BoxItemId, InventoryItemId, SubscriptionId, UserId};
pub use value_object::{ProductSlug, Sku, ValueObject};
