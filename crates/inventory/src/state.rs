use core::str::FromStr;

use serde::{Deserialize, Serialize};

use seasons_core::DomainError;

/// Length of the cleaning hold after a garment comes back, in days.
pub const QUARANTINE_DAYS: i64 = 5;

/// Lifecycle state of one physical garment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryState {
    Available,
    /// Allocated to a box (reserved or with the customer).
    Active,
    InTransit,
    Quarantine,
    Retired,
}

impl InventoryState {
    pub const ALL: [InventoryState; 5] = [
        InventoryState::Available,
        InventoryState::Active,
        InventoryState::InTransit,
        InventoryState::Quarantine,
        InventoryState::Retired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InventoryState::Available => "available",
            InventoryState::Active => "active",
            InventoryState::InTransit => "in_transit",
            InventoryState::Quarantine => "quarantine",
            InventoryState::Retired => "retired",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == InventoryState::Retired
    }

    /// The directed edges of the lifecycle. Nothing else is permitted.
    pub fn can_transition_to(self, next: InventoryState) -> bool {
        use InventoryState::*;
        matches!(
            (self, next),
            (Available, Active)
                | (Active, InTransit)
                | (Active, Quarantine)
                | (InTransit, Quarantine)
                | (Quarantine, Available)
                | (Available | Active | InTransit | Quarantine, Retired)
        )
    }
}

impl core::fmt::Display for InventoryState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InventoryState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown inventory state: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_has_no_outgoing_edges() {
        for next in InventoryState::ALL {
            assert!(!InventoryState::Retired.can_transition_to(next));
        }
    }

    #[test]
    fn quarantine_only_returns_to_available_or_retires() {
        let allowed: Vec<_> = InventoryState::ALL
            .into_iter()
            .filter(|s| InventoryState::Quarantine.can_transition_to(*s))
            .collect();
        assert_eq!(
            allowed,
            vec![InventoryState::Available, InventoryState::Retired]
        );
    }

    #[test]
    fn parse_rejects_values_outside_the_closed_set() {
        assert_eq!(
            "in_transit".parse::<InventoryState>().unwrap(),
            InventoryState::InTransit
        );
        assert!("lost".parse::<InventoryState>().is_err());
        assert!("Available".parse::<InventoryState>().is_err());
    }
}
