//! Cycle calendar arithmetic.

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use seasons_core::{DomainError, DomainResult};

/// Tunables of the rental cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePolicy {
    /// Items per box; checkout and swap require exactly this many.
    pub box_size: usize,
    pub cycle_months: u32,
    /// Days after cycle end by which garments must be back.
    pub return_grace_days: i64,
    /// The swap window opens when this many days (or fewer) remain in the cycle.
    pub swap_window_days: i64,
}

impl Default for CyclePolicy {
    fn default() -> Self {
        Self {
            box_size: 5,
            cycle_months: 3,
            return_grace_days: 7,
            swap_window_days: 10,
        }
    }
}

/// Dates of one cycle (and of the box that ships for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDates {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub return_by: NaiveDate,
}

impl CyclePolicy {
    /// Dates of a cycle beginning on `start`.
    ///
    /// Calendar months; a start day missing from the target month clamps to
    /// that month's last day (Nov 30 + 3 months = Feb 28/29).
    pub fn cycle_starting(&self, start: NaiveDate) -> DomainResult<CycleDates> {
        let end = start
            .checked_add_months(Months::new(self.cycle_months))
            .ok_or_else(|| DomainError::validation("cycle end date out of range"))?;
        let return_by = end
            .checked_add_signed(Duration::days(self.return_grace_days))
            .ok_or_else(|| DomainError::validation("return-by date out of range"))?;
        Ok(CycleDates {
            start,
            end,
            return_by,
        })
    }

    /// Whole days from `today` until `cycle_end` (negative once past).
    pub fn days_remaining(cycle_end: NaiveDate, today: NaiveDate) -> i64 {
        (cycle_end - today).num_days()
    }

    pub fn swap_window_open(&self, cycle_end: NaiveDate, today: NaiveDate) -> bool {
        Self::days_remaining(cycle_end, today) <= self.swap_window_days
    }

    /// Earliest date on which swaps are accepted for a cycle ending on `cycle_end`.
    pub fn swap_window_opens_on(&self, cycle_end: NaiveDate) -> NaiveDate {
        cycle_end - Duration::days(self.swap_window_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn three_month_cycle_with_week_of_grace() {
        let dates = CyclePolicy::default().cycle_starting(date(2025, 1, 15)).unwrap();
        assert_eq!(dates.end, date(2025, 4, 15));
        assert_eq!(dates.return_by, date(2025, 4, 22));
    }

    #[test]
    fn month_end_start_clamps() {
        let dates = CyclePolicy::default().cycle_starting(date(2024, 11, 30)).unwrap();
        assert_eq!(dates.end, date(2025, 2, 28));
        assert_eq!(dates.return_by, date(2025, 3, 7));
    }

    #[test]
    fn swap_window_boundary_is_inclusive_at_ten_days() {
        let policy = CyclePolicy::default();
        let end = date(2025, 6, 30);

        assert!(!policy.swap_window_open(end, date(2025, 6, 19)));
        assert!(policy.swap_window_open(end, date(2025, 6, 20)));
        assert!(policy.swap_window_open(end, end));
        assert!(policy.swap_window_open(end, date(2025, 7, 3)));
        assert_eq!(policy.swap_window_opens_on(end), date(2025, 6, 20));
    }
}
