use std::sync::Arc;

use serde_json::Value as JsonValue;

use seasons_core::{Clock, SystemClock};
use seasons_events::{EventBus, EventEnvelope, InMemoryEventBus};
use seasons_infra::{RentalConfig, RentalServices, Store};

/// In-process bus carrying JSON-encoded domain events.
pub type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;

/// Shared state injected into every handler.
pub struct AppServices<S> {
    pub rental: RentalServices<S, Bus>,
    pub bus: Arc<Bus>,
    pub clock: Arc<dyn Clock>,
    pub box_size: usize,
}

impl<S: Store> AppServices<S> {
    pub fn new(store: S, config: &RentalConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, config: &RentalConfig, clock: Arc<dyn Clock>) -> Self {
        let bus = Arc::new(Bus::new());
        spawn_event_logger(&bus);

        let rental = RentalServices::new(
            Arc::new(store),
            bus.clone(),
            clock.clone(),
            config.cycle,
            config.allocation_policy,
        );

        Self {
            rental,
            bus,
            clock,
            box_size: config.cycle.box_size,
        }
    }
}

/// Log every committed domain event. The thread ends when the bus is dropped.
fn spawn_event_logger(bus: &Arc<Bus>) {
    let subscription = bus.subscribe();

    let spawned = std::thread::Builder::new()
        .name("event-log".to_string())
        .spawn(move || {
            while let Ok(envelope) = subscription.recv() {
                tracing::info!(
                    event_type = envelope.event_type(),
                    aggregate_type = envelope.aggregate_type(),
                    aggregate_id = %envelope.aggregate_id(),
                    sequence = envelope.sequence_number(),
                    "domain event"
                );
            }
        });

    if let Err(e) = spawned {
        tracing::warn!(error = %e, "event logger not started");
    }
}
