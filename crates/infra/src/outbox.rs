//! Events collected during a transaction and published after it commits.
//!
//! ```text
//! service op → StoreTx writes + Outbox::record → commit → Outbox::publish
//! ```
//!
//! Publication is at-least-once from the consumer's view and never undoes a
//! commit: a failed publish is logged and dropped.

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use seasons_events::{Event, EventBus, EventEnvelope};

use crate::error::ServiceResult;

pub const INVENTORY_ITEM: &str = "inventory_item";
pub const SUBSCRIPTION: &str = "subscription";
pub const RENTAL_BOX: &str = "box";

#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<EventEnvelope<JsonValue>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `event` now so a serialization failure aborts the transaction.
    ///
    /// `version` is the aggregate version after the event was applied.
    pub fn record<E>(
        &mut self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        version: u64,
        event: &E,
    ) -> ServiceResult<()>
    where
        E: Event + Serialize,
    {
        let envelope = EventEnvelope::encode(aggregate_id, aggregate_type, version, event)?;
        self.pending.push(envelope);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn publish<B>(self, bus: &B)
    where
        B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
    {
        for envelope in self.pending {
            let event_type = envelope.event_type().to_string();
            let aggregate_id = envelope.aggregate_id();
            if let Err(err) = bus.publish(envelope) {
                tracing::warn!(
                    event_type = %event_type,
                    aggregate_id = %aggregate_id,
                    error = ?err,
                    "event publication failed after commit"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use seasons_events::InMemoryEventBus;

    #[derive(Debug, Clone, Serialize)]
    struct Ping {
        at: DateTime<Utc>,
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn publish_delivers_in_record_order() {
        let bus = InMemoryEventBus::<EventEnvelope<JsonValue>>::new();
        let sub = bus.subscribe();
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let id = Uuid::now_v7();

        let mut outbox = Outbox::new();
        outbox.record("thing", id, 1, &Ping { at }).unwrap();
        outbox.record("thing", id, 2, &Ping { at }).unwrap();
        assert_eq!(outbox.len(), 2);
        outbox.publish(&bus);

        assert_eq!(sub.try_recv().unwrap().sequence_number(), 1);
        assert_eq!(sub.try_recv().unwrap().sequence_number(), 2);
        assert!(sub.try_recv().is_err());
    }
}
