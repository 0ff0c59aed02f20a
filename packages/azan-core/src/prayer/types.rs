//! Time-table domain types.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

/// The five daily prayers, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PrayerName {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    /// All prayers in table order.
    pub const ALL: [PrayerName; 5] = [
        PrayerName::Fajr,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fajr => "Fajr",
            Self::Dhuhr => "Dhuhr",
            Self::Asr => "Asr",
            Self::Maghrib => "Maghrib",
            Self::Isha => "Isha",
        }
    }

    /// Length of the longest name, used to align tooltip columns.
    pub fn max_name_len() -> usize {
        Self::ALL.iter().map(|p| p.as_str().len()).max().unwrap_or(0)
    }
}

impl fmt::Display for PrayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time of day at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    /// Creates a slot time, returning `None` for out-of-range values.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Builds a slot time from minutes past midnight, wrapping into one day.
    pub fn from_minutes(minutes: i64) -> Self {
        let m = minutes.rem_euclid(24 * 60) as u32;
        // rem_euclid keeps m within 0..1440, so the time is always valid.
        Self(NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap_or(NaiveTime::MIN))
    }

    /// Truncates an arbitrary time of day to the minute.
    pub fn truncate(time: NaiveTime) -> Self {
        Self::from_minutes(i64::from(time.hour() * 60 + time.minute()))
    }

    /// Minutes past midnight.
    pub fn minutes(self) -> i64 {
        i64::from(self.0.hour() * 60 + self.0.minute())
    }

    pub fn as_naive(self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for SlotTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One named prayer time for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrayerSlot {
    pub name: PrayerName,
    pub time: SlotTime,
}

/// Today's five slots, immutable once built.
///
/// A table is replaced wholesale on day rollover; it is never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTimeTable {
    date: NaiveDate,
    timezone: Tz,
    slots: [PrayerSlot; 5],
    stale: bool,
}

impl DailyTimeTable {
    /// Builds a table from times given in canonical prayer order.
    pub fn new(date: NaiveDate, timezone: Tz, times: [SlotTime; 5]) -> Self {
        let slots = [0, 1, 2, 3, 4].map(|i| PrayerSlot {
            name: PrayerName::ALL[i],
            time: times[i],
        });
        Self {
            date,
            timezone,
            slots,
            stale: false,
        }
    }

    /// Re-dates this table's slots for `date`, flagged stale.
    ///
    /// Used when a fresh computation fails on rollover so the day still has a
    /// schedule while the refresh is retried.
    #[must_use]
    pub fn carried_over(&self, date: NaiveDate) -> Self {
        Self {
            date,
            timezone: self.timezone,
            slots: self.slots,
            stale: true,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Slots in table order.
    pub fn slots(&self) -> &[PrayerSlot] {
        &self.slots
    }

    pub fn slot(&self, name: PrayerName) -> Option<&PrayerSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Whether the slots were carried over from a previous day.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Converts `now` into this table's timezone.
    pub fn local_now(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.timezone)
    }

    /// Whether `now` falls on a later (or earlier) local date than the table.
    pub fn is_outdated(&self, now: DateTime<Utc>) -> bool {
        self.local_now(now).date_naive() != self.date
    }
}
