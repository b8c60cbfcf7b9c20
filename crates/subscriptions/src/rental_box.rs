use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use seasons_core::{
    Aggregate, AggregateRoot, BoxId, BoxItemId, DomainError, DomainResult, Entity,
    InventoryItemId, ProductSlug, SubscriptionId,
};
use seasons_events::Event;

use crate::schedule::CycleDates;

const MAX_LABEL_URL_LEN: usize = 500;

/// Fulfilment status of one cycle's box.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxStatus {
    /// Reserved for a staged selection flow; checkout and swap never assign it.
    Selecting,
    Confirmed,
    Shipped,
    /// With the customer.
    Active,
    /// A swap was confirmed; the garments are due back.
    SwapPending,
    Returned,
    Completed,
}

impl BoxStatus {
    pub const ALL: [BoxStatus; 7] = [
        BoxStatus::Selecting,
        BoxStatus::Confirmed,
        BoxStatus::Shipped,
        BoxStatus::Active,
        BoxStatus::SwapPending,
        BoxStatus::Returned,
        BoxStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BoxStatus::Selecting => "selecting",
            BoxStatus::Confirmed => "confirmed",
            BoxStatus::Shipped => "shipped",
            BoxStatus::Active => "active",
            BoxStatus::SwapPending => "swap_pending",
            BoxStatus::Returned => "returned",
            BoxStatus::Completed => "completed",
        }
    }

    /// The subscription's current box is its single open box.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            BoxStatus::Selecting | BoxStatus::Confirmed | BoxStatus::Shipped | BoxStatus::Active
        )
    }

    pub fn can_advance_to(self, next: BoxStatus) -> bool {
        use BoxStatus::*;
        matches!(
            (self, next),
            (Selecting, Confirmed)
                | (Confirmed, Shipped)
                | (Shipped, Active)
                | (Active, SwapPending)
                | (Active, Returned)
                | (SwapPending, Returned)
                | (Returned, Completed)
        )
    }
}

impl core::fmt::Display for BoxStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoxStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BoxStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown box status: {s}")))
    }
}

/// Persisted shape of a [`RentalBox`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalBoxSnapshot {
    pub id: BoxId,
    pub subscription_id: SubscriptionId,
    pub cycle_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub return_by_date: NaiveDate,
    pub status: BoxStatus,
    pub return_label_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: the shipment for one cycle of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RentalBox {
    data: RentalBoxSnapshot,
}

impl RentalBox {
    /// Boxes are born `confirmed` by checkout and swap.
    pub fn open(cmd: &OpenBox) -> DomainResult<(Self, BoxEvent)> {
        if cmd.cycle_number == 0 {
            return Err(DomainError::validation("cycle numbers start at 1"));
        }
        let event = BoxEvent::Confirmed(BoxConfirmed {
            box_id: cmd.box_id,
            subscription_id: cmd.subscription_id,
            cycle_number: cmd.cycle_number,
            start_date: cmd.dates.start,
            end_date: cmd.dates.end,
            return_by_date: cmd.dates.return_by,
            occurred_at: cmd.occurred_at,
        });
        let mut rental_box = Self {
            data: RentalBoxSnapshot {
                id: cmd.box_id,
                subscription_id: cmd.subscription_id,
                cycle_number: cmd.cycle_number,
                start_date: cmd.dates.start,
                end_date: cmd.dates.end,
                return_by_date: cmd.dates.return_by,
                status: BoxStatus::Selecting,
                return_label_url: None,
                created_at: cmd.occurred_at,
                updated_at: cmd.occurred_at,
                version: 0,
            },
        };
        rental_box.apply(&event);
        Ok((rental_box, event))
    }

    pub fn restore(data: RentalBoxSnapshot) -> DomainResult<Self> {
        if data.cycle_number == 0 {
            return Err(DomainError::validation(format!(
                "box {}: cycle numbers start at 1",
                data.id
            )));
        }
        if data.return_by_date < data.end_date {
            return Err(DomainError::validation(format!(
                "box {}: return-by date precedes cycle end",
                data.id
            )));
        }
        Ok(Self { data })
    }

    pub fn snapshot(&self) -> &RentalBoxSnapshot {
        &self.data
    }

    pub fn id_typed(&self) -> BoxId {
        self.data.id
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.data.subscription_id
    }

    pub fn cycle_number(&self) -> u32 {
        self.data.cycle_number
    }

    pub fn status(&self) -> BoxStatus {
        self.data.status
    }

    pub fn start_date(&self) -> NaiveDate {
        self.data.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.data.end_date
    }

    pub fn return_by_date(&self) -> NaiveDate {
        self.data.return_by_date
    }

    pub fn return_label_url(&self) -> Option<&str> {
        self.data.return_label_url.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.data.status.is_open()
    }
}

impl AggregateRoot for RentalBox {
    type Id = BoxId;

    fn id(&self) -> &Self::Id {
        &self.data.id
    }

    fn version(&self) -> u64 {
        self.data.version
    }
}

/// Join row: which physical garment fills which slot of a box.
///
/// Written once at allocation and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxItem {
    pub id: BoxItemId,
    pub box_id: BoxId,
    pub inventory_item_id: InventoryItemId,
    pub product: ProductSlug,
    pub added_at: DateTime<Utc>,
}

impl Entity for BoxItem {
    type Id = BoxItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn recorded_at(&self) -> DateTime<Utc> {
        self.added_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBox {
    pub box_id: BoxId,
    pub subscription_id: SubscriptionId,
    pub cycle_number: u32,
    pub dates: CycleDates,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceBox {
    pub box_id: BoxId,
    pub to: BoxStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturnLabel {
    pub box_id: BoxId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxCommand {
    Advance(AdvanceBox),
    RecordReturnLabel(RecordReturnLabel),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxConfirmed {
    pub box_id: BoxId,
    pub subscription_id: SubscriptionId,
    pub cycle_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub return_by_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxStatusChanged {
    pub box_id: BoxId,
    pub from: BoxStatus,
    pub to: BoxStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLabelRecorded {
    pub box_id: BoxId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoxEvent {
    Confirmed(BoxConfirmed),
    StatusChanged(BoxStatusChanged),
    ReturnLabelRecorded(ReturnLabelRecorded),
}

impl Event for BoxEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BoxEvent::Confirmed(_) => "box.confirmed",
            BoxEvent::StatusChanged(_) => "box.status_changed",
            BoxEvent::ReturnLabelRecorded(_) => "box.return_label_recorded",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BoxEvent::Confirmed(e) => e.occurred_at,
            BoxEvent::StatusChanged(e) => e.occurred_at,
            BoxEvent::ReturnLabelRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for RentalBox {
    type Command = BoxCommand;
    type Event = BoxEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BoxEvent::Confirmed(e) => {
                self.data.status = BoxStatus::Confirmed;
                self.data.updated_at = e.occurred_at;
            }
            BoxEvent::StatusChanged(e) => {
                self.data.status = e.to;
                self.data.updated_at = e.occurred_at;
            }
            BoxEvent::ReturnLabelRecorded(e) => {
                self.data.return_label_url = Some(e.url.clone());
                self.data.updated_at = e.occurred_at;
            }
        }
        self.data.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BoxCommand::Advance(cmd) => self.handle_advance(cmd),
            BoxCommand::RecordReturnLabel(cmd) => self.handle_return_label(cmd),
        }
    }
}

impl RentalBox {
    fn ensure_id(&self, id: BoxId) -> Result<(), DomainError> {
        if self.data.id != id {
            return Err(DomainError::validation("box_id mismatch"));
        }
        Ok(())
    }

    fn handle_advance(&self, cmd: &AdvanceBox) -> Result<Vec<BoxEvent>, DomainError> {
        self.ensure_id(cmd.box_id)?;
        let from = self.data.status;
        if !from.can_advance_to(cmd.to) {
            return Err(DomainError::invalid_transition("box", from, cmd.to));
        }
        Ok(vec![BoxEvent::StatusChanged(BoxStatusChanged {
            box_id: cmd.box_id,
            from,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return_label(&self, cmd: &RecordReturnLabel) -> Result<Vec<BoxEvent>, DomainError> {
        self.ensure_id(cmd.box_id)?;
        if !matches!(
            self.data.status,
            BoxStatus::Shipped | BoxStatus::Active | BoxStatus::SwapPending
        ) {
            return Err(DomainError::validation(format!(
                "return labels are issued for boxes out with the customer (box is {})",
                self.data.status
            )));
        }
        let url = cmd.url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(DomainError::validation("return label url must be http(s)"));
        }
        if url.len() > MAX_LABEL_URL_LEN {
            return Err(DomainError::validation(format!(
                "return label url exceeds {MAX_LABEL_URL_LEN} characters"
            )));
        }
        Ok(vec![BoxEvent::ReturnLabelRecorded(ReturnLabelRecorded {
            box_id: cmd.box_id,
            url: url.to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
