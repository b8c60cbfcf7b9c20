use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use seasons_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, SubscriptionId, UserId,
};
use seasons_events::Event;

use crate::schedule::{CycleDates, CyclePolicy};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 3] = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, next),
            (Active, Paused) | (Paused, Active) | (Active | Paused, Cancelled)
        )
    }
}

impl core::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubscriptionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown subscription status: {s}")))
    }
}

/// Persisted shape of a [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub status: SubscriptionStatus,
    pub cycle_start: NaiveDate,
    pub cycle_end: NaiveDate,
    pub next_billing: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: a customer's recurring quarterly plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Subscription {
    data: SubscriptionSnapshot,
}

impl Subscription {
    pub fn start(cmd: &StartSubscription) -> (Self, SubscriptionEvent) {
        let event = SubscriptionEvent::Started(SubscriptionStarted {
            subscription_id: cmd.subscription_id,
            user_id: cmd.user_id,
            cycle_start: cmd.dates.start,
            cycle_end: cmd.dates.end,
            next_billing: cmd.dates.end,
            occurred_at: cmd.occurred_at,
        });
        let mut subscription = Self {
            data: SubscriptionSnapshot {
                id: cmd.subscription_id,
                user_id: cmd.user_id,
                status: SubscriptionStatus::Active,
                cycle_start: cmd.dates.start,
                cycle_end: cmd.dates.end,
                next_billing: cmd.dates.end,
                created_at: cmd.occurred_at,
                updated_at: cmd.occurred_at,
                version: 0,
            },
        };
        subscription.apply(&event);
        (subscription, event)
    }

    pub fn restore(data: SubscriptionSnapshot) -> DomainResult<Self> {
        if data.cycle_end <= data.cycle_start {
            return Err(DomainError::validation(format!(
                "subscription {}: cycle must end after it starts",
                data.id
            )));
        }
        Ok(Self { data })
    }

    pub fn snapshot(&self) -> &SubscriptionSnapshot {
        &self.data
    }

    pub fn id_typed(&self) -> SubscriptionId {
        self.data.id
    }

    pub fn user_id(&self) -> UserId {
        self.data.user_id
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.data.status
    }

    pub fn cycle_start(&self) -> NaiveDate {
        self.data.cycle_start
    }

    pub fn cycle_end(&self) -> NaiveDate {
        self.data.cycle_end
    }

    pub fn next_billing(&self) -> NaiveDate {
        self.data.next_billing
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.data.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.data.status == SubscriptionStatus::Cancelled
    }

    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        CyclePolicy::days_remaining(self.data.cycle_end, today)
    }

    pub fn swap_window_open(&self, policy: &CyclePolicy, today: NaiveDate) -> bool {
        policy.swap_window_open(self.data.cycle_end, today)
    }
}

impl AggregateRoot for Subscription {
    type Id = SubscriptionId;

    fn id(&self) -> &Self::Id {
        &self.data.id
    }

    fn version(&self) -> u64 {
        self.data.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSubscription {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub dates: CycleDates,
    pub occurred_at: DateTime<Utc>,
}

/// Command payload shared by pause, resume and cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub subscription_id: SubscriptionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: move the plan onto the next cycle's dates (swap confirmed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceCycle {
    pub subscription_id: SubscriptionId,
    pub dates: CycleDates,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionCommand {
    Pause(ChangeStatus),
    Resume(ChangeStatus),
    Cancel(ChangeStatus),
    AdvanceCycle(AdvanceCycle),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStarted {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub cycle_start: NaiveDate,
    pub cycle_end: NaiveDate,
    pub next_billing: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatusChanged {
    pub subscription_id: SubscriptionId,
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAdvanced {
    pub subscription_id: SubscriptionId,
    pub cycle_start: NaiveDate,
    pub cycle_end: NaiveDate,
    pub next_billing: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Started(SubscriptionStarted),
    StatusChanged(SubscriptionStatusChanged),
    CycleAdvanced(CycleAdvanced),
}

impl Event for SubscriptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SubscriptionEvent::Started(_) => "subscription.started",
            SubscriptionEvent::StatusChanged(e) => match e.to {
                SubscriptionStatus::Active => "subscription.resumed",
                SubscriptionStatus::Paused => "subscription.paused",
                SubscriptionStatus::Cancelled => "subscription.cancelled",
            },
            SubscriptionEvent::CycleAdvanced(_) => "subscription.cycle_advanced",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SubscriptionEvent::Started(e) => e.occurred_at,
            SubscriptionEvent::StatusChanged(e) => e.occurred_at,
            SubscriptionEvent::CycleAdvanced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Subscription {
    type Command = SubscriptionCommand;
    type Event = SubscriptionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SubscriptionEvent::Started(e) => {
                self.data.status = SubscriptionStatus::Active;
                self.data.updated_at = e.occurred_at;
            }
            SubscriptionEvent::StatusChanged(e) => {
                self.data.status = e.to;
                self.data.updated_at = e.occurred_at;
            }
            SubscriptionEvent::CycleAdvanced(e) => {
                self.data.cycle_start = e.cycle_start;
                self.data.cycle_end = e.cycle_end;
                self.data.next_billing = e.next_billing;
                self.data.updated_at = e.occurred_at;
            }
        }
        self.data.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SubscriptionCommand::Pause(cmd) => self.change_status(cmd, SubscriptionStatus::Paused),
            SubscriptionCommand::Resume(cmd) => self.change_status(cmd, SubscriptionStatus::Active),
            SubscriptionCommand::Cancel(cmd) => {
                self.change_status(cmd, SubscriptionStatus::Cancelled)
            }
            SubscriptionCommand::AdvanceCycle(cmd) => self.handle_advance(cmd),
        }
    }
}

impl Subscription {
    fn ensure_id(&self, id: SubscriptionId) -> Result<(), DomainError> {
        if self.data.id != id {
            return Err(DomainError::validation("subscription_id mismatch"));
        }
        Ok(())
    }

    fn change_status(
        &self,
        cmd: &ChangeStatus,
        to: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionEvent>, DomainError> {
        self.ensure_id(cmd.subscription_id)?;
        let from = self.data.status;
        if !from.can_transition_to(to) {
            return Err(DomainError::invalid_transition("subscription", from, to));
        }
        Ok(vec![SubscriptionEvent::StatusChanged(
            SubscriptionStatusChanged {
                subscription_id: cmd.subscription_id,
                from,
                to,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_advance(&self, cmd: &AdvanceCycle) -> Result<Vec<SubscriptionEvent>, DomainError> {
        self.ensure_id(cmd.subscription_id)?;
        if self.is_cancelled() {
            return Err(DomainError::InvalidTransition(
                "cancelled subscription cannot start a new cycle".into(),
            ));
        }
        if cmd.dates.start < self.data.cycle_start {
            return Err(DomainError::validation("next cycle cannot start before the current one"));
        }
        Ok(vec![SubscriptionEvent::CycleAdvanced(CycleAdvanced {
            subscription_id: cmd.subscription_id,
            cycle_start: cmd.dates.start,
            cycle_end: cmd.dates.end,
            next_billing: cmd.dates.end,
            occurred_at: cmd.occurred_at,
        })])
    }
}
