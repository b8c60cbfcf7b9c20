use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use seasons_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, InventoryItemId, ProductSlug, Sku,
};
use seasons_events::Event;

use crate::state::{InventoryState, QUARANTINE_DAYS};

/// Persisted shape of an [`InventoryItem`].
///
/// Stores read and write this; only [`InventoryItem::restore`] turns it back
/// into an aggregate, after checking the row's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemSnapshot {
    pub id: InventoryItemId,
    pub product: ProductSlug,
    pub sku: Sku,
    pub state: InventoryState,
    pub condition_notes: Option<String>,
    pub quarantine_until: Option<NaiveDate>,
    pub retirement_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: one physical, uniquely SKU'd garment.
///
/// State changes only through [`Aggregate::handle`] / [`Aggregate::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InventoryItem {
    data: InventoryItemSnapshot,
}

impl InventoryItem {
    /// Intake of a new garment; always starts `available`.
    pub fn register(cmd: &RegisterItem) -> DomainResult<(Self, InventoryEvent)> {
        let event = InventoryEvent::ItemRegistered(ItemRegistered {
            item_id: cmd.item_id,
            product: cmd.product.clone(),
            sku: cmd.sku.clone(),
            condition_notes: normalize_notes(cmd.condition_notes.as_deref()),
            occurred_at: cmd.occurred_at,
        });

        let mut item = Self {
            data: InventoryItemSnapshot {
                id: cmd.item_id,
                product: cmd.product.clone(),
                sku: cmd.sku.clone(),
                state: InventoryState::Available,
                condition_notes: None,
                quarantine_until: None,
                retirement_reason: None,
                created_at: cmd.occurred_at,
                updated_at: cmd.occurred_at,
                version: 0,
            },
        };
        item.apply(&event);
        Ok((item, event))
    }

    /// Rebuild from a stored row.
    pub fn restore(data: InventoryItemSnapshot) -> DomainResult<Self> {
        if data.quarantine_until.is_some() != (data.state == InventoryState::Quarantine) {
            return Err(DomainError::validation(format!(
                "item {}: quarantine_until must be set exactly while quarantined",
                data.id
            )));
        }
        if data.retirement_reason.is_some() != (data.state == InventoryState::Retired) {
            return Err(DomainError::validation(format!(
                "item {}: retirement_reason must be set exactly when retired",
                data.id
            )));
        }
        Ok(Self { data })
    }

    pub fn snapshot(&self) -> &InventoryItemSnapshot {
        &self.data
    }

    pub fn into_snapshot(self) -> InventoryItemSnapshot {
        self.data
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.data.id
    }

    pub fn product(&self) -> &ProductSlug {
        &self.data.product
    }

    pub fn sku(&self) -> &Sku {
        &self.data.sku
    }

    pub fn state(&self) -> InventoryState {
        self.data.state
    }

    pub fn quarantine_until(&self) -> Option<NaiveDate> {
        self.data.quarantine_until
    }

    pub fn retirement_reason(&self) -> Option<&str> {
        self.data.retirement_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.data.created_at
    }

    /// A quarantined garment becomes allocatable the day after its hold ends.
    pub fn quarantine_elapsed(&self, today: NaiveDate) -> bool {
        self.data.quarantine_until.is_some_and(|until| until < today)
    }

    /// Allocation eligibility.
    ///
    /// There is no background sweep out of quarantine: an elapsed hold counts
    /// as available at read time, and the claim itself performs the move.
    pub fn is_eligible(&self, today: NaiveDate) -> bool {
        match self.data.state {
            InventoryState::Available => self
                .data
                .quarantine_until
                .is_none_or(|until| until < today),
            InventoryState::Quarantine => self.quarantine_elapsed(today),
            _ => false,
        }
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.data.id
    }

    fn version(&self) -> u64 {
        self.data.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub item_id: InventoryItemId,
    pub product: ProductSlug,
    pub sku: Sku,
    pub condition_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionState.
///
/// `notes` become the condition notes; for `to == retired` they are the
/// mandatory retirement reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionState {
    pub item_id: InventoryItemId,
    pub to: InventoryState,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireItem {
    pub item_id: InventoryItemId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AllocateItem (claim into a box).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateItem {
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    TransitionState(TransitionState),
    Retire(RetireItem),
    Allocate(AllocateItem),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub item_id: InventoryItemId,
    pub product: ProductSlug,
    pub sku: Sku,
    pub condition_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StateChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    pub item_id: InventoryItemId,
    pub from: InventoryState,
    pub to: InventoryState,
    pub quarantine_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAllocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAllocated {
    pub item_id: InventoryItemId,
    pub product: ProductSlug,
    pub from: InventoryState,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRetired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRetired {
    pub item_id: InventoryItemId,
    pub from: InventoryState,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryEvent {
    ItemRegistered(ItemRegistered),
    StateChanged(StateChanged),
    ItemAllocated(ItemAllocated),
    ItemRetired(ItemRetired),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemRegistered(_) => "inventory.item.registered",
            InventoryEvent::StateChanged(_) => "inventory.item.state_changed",
            InventoryEvent::ItemAllocated(_) => "inventory.item.allocated",
            InventoryEvent::ItemRetired(_) => "inventory.item.retired",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemRegistered(e) => e.occurred_at,
            InventoryEvent::StateChanged(e) => e.occurred_at,
            InventoryEvent::ItemAllocated(e) => e.occurred_at,
            InventoryEvent::ItemRetired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemRegistered(e) => {
                self.data.state = InventoryState::Available;
                self.data.condition_notes = e.condition_notes.clone();
                self.data.updated_at = e.occurred_at;
            }
            InventoryEvent::StateChanged(e) => {
                self.data.state = e.to;
                self.data.quarantine_until = e.quarantine_until;
                if e.notes.is_some() {
                    self.data.condition_notes = e.notes.clone();
                }
                self.data.updated_at = e.occurred_at;
            }
            InventoryEvent::ItemAllocated(e) => {
                self.data.state = InventoryState::Active;
                self.data.quarantine_until = None;
                self.data.updated_at = e.occurred_at;
            }
            InventoryEvent::ItemRetired(e) => {
                self.data.state = InventoryState::Retired;
                self.data.quarantine_until = None;
                self.data.retirement_reason = Some(e.reason.clone());
                self.data.updated_at = e.occurred_at;
            }
        }

        self.data.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::TransitionState(cmd) => self.handle_transition(cmd),
            InventoryCommand::Retire(cmd) => self.handle_retire(cmd),
            InventoryCommand::Allocate(cmd) => self.handle_allocate(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_item_id(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        if self.data.id != item_id {
            return Err(DomainError::validation("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_transition(&self, cmd: &TransitionState) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;

        if cmd.to == InventoryState::Retired {
            let reason = normalize_notes(cmd.notes.as_deref())
                .ok_or_else(|| DomainError::validation("retirement requires a reason"))?;
            return self.handle_retire(&RetireItem {
                item_id: cmd.item_id,
                reason,
                occurred_at: cmd.occurred_at,
            });
        }

        let from = self.data.state;
        if !from.can_transition_to(cmd.to) {
            return Err(DomainError::invalid_transition("inventory item", from, cmd.to));
        }

        let today = cmd.occurred_at.date_naive();
        if from == InventoryState::Quarantine && !self.quarantine_elapsed(today) {
            let until = self
                .data
                .quarantine_until
                .map(|d| d.to_string())
                .unwrap_or_default();
            return Err(DomainError::InvalidTransition(format!(
                "inventory item is quarantined until {until}"
            )));
        }

        let quarantine_until = (cmd.to == InventoryState::Quarantine)
            .then(|| today + Duration::days(QUARANTINE_DAYS));

        Ok(vec![InventoryEvent::StateChanged(StateChanged {
            item_id: cmd.item_id,
            from,
            to: cmd.to,
            quarantine_until,
            notes: normalize_notes(cmd.notes.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;

        let from = self.data.state;
        if from.is_terminal() {
            return Err(DomainError::invalid_transition(
                "inventory item",
                from,
                InventoryState::Retired,
            ));
        }
        let reason = normalize_notes(Some(&cmd.reason))
            .ok_or_else(|| DomainError::validation("retirement requires a reason"))?;

        Ok(vec![InventoryEvent::ItemRetired(ItemRetired {
            item_id: cmd.item_id,
            from,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_allocate(&self, cmd: &AllocateItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;

        let today = cmd.occurred_at.date_naive();
        if !self.is_eligible(today) {
            return Err(DomainError::invalid_transition(
                "inventory item",
                self.data.state,
                InventoryState::Active,
            ));
        }

        Ok(vec![InventoryEvent::ItemAllocated(ItemAllocated {
            item_id: cmd.item_id,
            product: self.data.product.clone(),
            from: self.data.state,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
