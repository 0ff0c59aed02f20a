//! Daily prayer time-table.
//!
//! - [`types`]: prayer names, minute-resolution slot times and the immutable
//!   [`DailyTimeTable`]
//! - [`calc`]: the astronomical calculation
//! - [`provider`]: the [`TimeTableProvider`] seam the scheduler depends on

use thiserror::Error;

pub mod calc;
pub mod provider;
#[cfg(test)]
pub(crate) mod test_fixtures;
pub mod types;

pub use calc::{compute_times, AsrMadhab, CalculationMethod, CalculationParams};
pub use provider::{AstronomicalProvider, TimeTableProvider};
pub use types::{DailyTimeTable, PrayerName, PrayerSlot, SlotTime};

/// Errors that can occur while computing a time-table.
#[derive(Debug, Error)]
pub enum CalcError {
    /// The sun never reaches the angle that defines a prayer on this date
    /// (polar day or night).
    #[error("sun never reaches the angle required for {prayer} on this date")]
    SunNeverReaches { prayer: PrayerName },

    /// Latitude or longitude outside the valid range.
    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Result alias for time-table computation.
pub type CalcResult<T> = Result<T, CalcError>;
