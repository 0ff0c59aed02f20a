//! Time-table provider seam.

use chrono::NaiveDate;

use super::calc::{compute_times, CalculationParams};
use super::types::DailyTimeTable;
use super::CalcResult;
use crate::location::ResolvedLocation;

/// Produces the time-table for a date and location.
///
/// Used by the scheduler on startup and on every day rollover. A failure is
/// fatal to that refresh attempt only; the caller keeps its previous table.
pub trait TimeTableProvider: Send + Sync {
    fn compute(&self, date: NaiveDate, location: &ResolvedLocation)
        -> CalcResult<DailyTimeTable>;
}

/// Provider backed by the in-tree astronomical calculation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstronomicalProvider {
    params: CalculationParams,
}

impl AstronomicalProvider {
    pub fn new(params: CalculationParams) -> Self {
        Self { params }
    }
}

impl TimeTableProvider for AstronomicalProvider {
    fn compute(
        &self,
        date: NaiveDate,
        location: &ResolvedLocation,
    ) -> CalcResult<DailyTimeTable> {
        // The offset on the target date, not at resolve time, so a table
        // computed across a DST switch uses the right wall clock.
        let offset = location.utc_offset_hours_on(date);
        let times = compute_times(
            date,
            location.latitude,
            location.longitude,
            offset,
            self.params,
        )?;
        log::debug!(
            "[TimeTable] {} @ ({:.4}, {:.4}) {} offset {:+}: {:?}",
            date,
            location.latitude,
            location.longitude,
            location.timezone,
            offset,
            times.map(|t| t.to_string())
        );
        Ok(DailyTimeTable::new(date, location.timezone, times))
    }
}
