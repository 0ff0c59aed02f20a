//! Shared test fixtures for time-table tests.
//!
//! Used by the scheduler, state and status tests to avoid duplication.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use super::{DailyTimeTable, SlotTime};

/// Shorthand for a slot time.
pub fn hm(hour: u32, minute: u32) -> SlotTime {
    SlotTime::from_hm(hour, minute).expect("valid test time")
}

/// The reference date used across scheduler tests.
pub fn sample_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid test date")
}

/// Fajr 05:00, Dhuhr 12:15, Asr 15:30, Maghrib 18:45, Isha 20:00 in UTC.
pub fn sample_table(date: NaiveDate) -> DailyTimeTable {
    DailyTimeTable::new(
        date,
        chrono_tz::UTC,
        [hm(5, 0), hm(12, 15), hm(15, 30), hm(18, 45), hm(20, 0)],
    )
}

/// An instant on `date` at `hour:minute:second` local time in `tz`.
pub fn local_instant(
    tz: Tz,
    date: NaiveDate,
    hour: u32,
    minute: u32,
    second: u32,
) -> DateTime<Utc> {
    let naive = date
        .and_hms_opt(hour, minute, second)
        .expect("valid test time");
    tz.from_local_datetime(&naive)
        .single()
        .expect("unambiguous test time")
        .with_timezone(&Utc)
}

/// An instant on the sample date in UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    local_instant(chrono_tz::UTC, sample_date(), hour, minute, 0)
}
