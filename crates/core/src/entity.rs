//! Entity trait: identity that lives inside an aggregate's boundary.

use chrono::{DateTime, Utc};

/// Entity with a stable identity that is recorded once and never rewritten
/// (e.g. the row tying a physical garment to a box slot).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// When the entity was recorded.
    fn recorded_at(&self) -> DateTime<Utc>;
}
