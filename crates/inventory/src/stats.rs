use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::item::InventoryItem;
use crate::state::InventoryState;

/// Fleet counts by stored state.
///
/// `quarantine_elapsed` is the subset of `quarantine` whose hold is over:
/// those garments are allocatable even though their stored state has not
/// been flipped yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total: u64,
    pub available: u64,
    pub active: u64,
    pub in_transit: u64,
    pub quarantine: u64,
    pub retired: u64,
    pub quarantine_elapsed: u64,
}

impl InventoryStats {
    pub fn record(&mut self, state: InventoryState, count: u64) {
        self.total += count;
        match state {
            InventoryState::Available => self.available += count,
            InventoryState::Active => self.active += count,
            InventoryState::InTransit => self.in_transit += count,
            InventoryState::Quarantine => self.quarantine += count,
            InventoryState::Retired => self.retired += count,
        }
    }

    pub fn tally<'a>(items: impl IntoIterator<Item = &'a InventoryItem>, today: NaiveDate) -> Self {
        let mut stats = Self::default();
        for item in items {
            stats.record(item.state(), 1);
            if item.state() == InventoryState::Quarantine && item.quarantine_elapsed(today) {
                stats.quarantine_elapsed += 1;
            }
        }
        stats
    }

    /// Garments a claim could pick right now.
    pub fn allocatable(&self) -> u64 {
        self.available + self.quarantine_elapsed
    }
}
