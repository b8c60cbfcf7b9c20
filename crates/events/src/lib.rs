//! Domain events and their in-process distribution.
//!
//! State lives in the relational store; events are published **after** a
//! transaction commits so downstream consumers (notifications, analytics)
//! can react to ledger and cycle changes.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
