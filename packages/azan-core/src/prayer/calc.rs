//! Astronomical prayer time calculation.
//!
//! Solar position uses the low-precision formulation from the U.S. Naval
//! Observatory (accurate to about a minute between 1950 and 2050), which is
//! well within the minute resolution the scheduler works at.
//!
//! All intermediate times are hours of the local day. Angles are degrees.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::types::{PrayerName, SlotTime};
use super::{CalcError, CalcResult};

/// Sun altitude at sunrise/sunset, accounting for refraction and the solar disc.
const RISE_SET_ANGLE: f64 = 0.833;

/// Fajr/Isha convention used by a calculation authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    /// University of Islamic Sciences, Karachi (18° / 18°).
    Karachi,
    /// Muslim World League (18° / 17°).
    MuslimWorldLeague,
    /// Egyptian General Authority of Survey (19.5° / 17.5°).
    Egypt,
    /// Umm al-Qura University, Makkah (18.5° / Isha 90 minutes after Maghrib).
    UmmAlQura,
    /// Islamic Society of North America (15° / 15°).
    #[default]
    Isna,
}

/// How Isha is derived for a method.
#[derive(Debug, Clone, Copy, PartialEq)]
enum IshaRule {
    Angle(f64),
    MinutesAfterMaghrib(f64),
}

impl CalculationMethod {
    fn fajr_angle(self) -> f64 {
        match self {
            Self::Karachi | Self::MuslimWorldLeague => 18.0,
            Self::Egypt => 19.5,
            Self::UmmAlQura => 18.5,
            Self::Isna => 15.0,
        }
    }

    fn isha_rule(self) -> IshaRule {
        match self {
            Self::Karachi => IshaRule::Angle(18.0),
            Self::MuslimWorldLeague => IshaRule::Angle(17.0),
            Self::Egypt => IshaRule::Angle(17.5),
            Self::UmmAlQura => IshaRule::MinutesAfterMaghrib(90.0),
            Self::Isna => IshaRule::Angle(15.0),
        }
    }
}

/// Juristic convention for Asr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AsrMadhab {
    /// Shadow equals object length (Shafi'i, Maliki, Hanbali).
    #[default]
    Standard,
    /// Shadow equals twice the object length.
    Hanafi,
}

impl AsrMadhab {
    fn shadow_factor(self) -> f64 {
        match self {
            Self::Standard => 1.0,
            Self::Hanafi => 2.0,
        }
    }
}

/// Parameters fixed for the lifetime of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculationParams {
    pub method: CalculationMethod,
    pub asr_madhab: AsrMadhab,
}

/// Computes the five prayer times for a date and place.
///
/// `utc_offset_hours` converts solar time into local wall-clock time. Results
/// are truncated to the minute and returned in canonical prayer order.
pub fn compute_times(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    utc_offset_hours: f64,
    params: CalculationParams,
) -> CalcResult<[SlotTime; 5]> {
    if !latitude.is_finite()
        || !longitude.is_finite()
        || !(-90.0..=90.0).contains(&latitude)
        || !(-180.0..=180.0).contains(&longitude)
    {
        return Err(CalcError::InvalidCoordinates {
            latitude,
            longitude,
        });
    }

    let sky = Sky {
        jdate: julian_date(date) - longitude / (15.0 * 24.0),
        latitude,
    };

    // Initial guesses, refined by evaluating the sun position near each event.
    let fajr = sky
        .sun_angle_time(params.method.fajr_angle(), 5.0, Direction::BeforeNoon)
        .ok_or(CalcError::SunNeverReaches {
            prayer: PrayerName::Fajr,
        })?;
    let dhuhr = sky.mid_day(12.0);
    let asr = sky
        .asr_time(params.asr_madhab.shadow_factor(), 13.0)
        .ok_or(CalcError::SunNeverReaches {
            prayer: PrayerName::Asr,
        })?;
    let maghrib = sky
        .sun_angle_time(RISE_SET_ANGLE, 18.0, Direction::AfterNoon)
        .ok_or(CalcError::SunNeverReaches {
            prayer: PrayerName::Maghrib,
        })?;
    let isha = match params.method.isha_rule() {
        IshaRule::Angle(angle) => sky
            .sun_angle_time(angle, 18.0, Direction::AfterNoon)
            .ok_or(CalcError::SunNeverReaches {
                prayer: PrayerName::Isha,
            })?,
        IshaRule::MinutesAfterMaghrib(minutes) => maghrib + minutes / 60.0,
    };

    let adjust = utc_offset_hours - longitude / 15.0;
    Ok([fajr, dhuhr, asr, maghrib, isha].map(|t| to_slot_time(t + adjust)))
}

#[derive(Clone, Copy)]
enum Direction {
    BeforeNoon,
    AfterNoon,
}

struct SunPosition {
    declination: f64,
    equation_of_time: f64,
}

struct Sky {
    jdate: f64,
    latitude: f64,
}

impl Sky {
    fn sun_position(&self, hours: f64) -> SunPosition {
        let d = self.jdate + hours / 24.0 - 2_451_545.0;
        let g = fix_angle(357.529 + 0.985_600_28 * d);
        let q = fix_angle(280.459 + 0.985_647_36 * d);
        let l = fix_angle(q + 1.915 * dsin(g) + 0.020 * dsin(2.0 * g));
        let e = 23.439 - 0.000_000_36 * d;

        let ra = darctan2(dcos(e) * dsin(l), dcos(l)) / 15.0;
        SunPosition {
            declination: darcsin(dsin(e) * dsin(l)),
            equation_of_time: q / 15.0 - fix_hour(ra),
        }
    }

    fn mid_day(&self, hours: f64) -> f64 {
        fix_hour(12.0 - self.sun_position(hours).equation_of_time)
    }

    /// Time at which the sun is `angle` degrees below the horizon, or `None`
    /// when it never gets there on this day (polar day/night).
    fn sun_angle_time(&self, angle: f64, hours: f64, direction: Direction) -> Option<f64> {
        let decl = self.sun_position(hours).declination;
        let noon = self.mid_day(hours);
        let cos_h = (-dsin(angle) - dsin(decl) * dsin(self.latitude))
            / (dcos(decl) * dcos(self.latitude));
        if !(-1.0..=1.0).contains(&cos_h) {
            return None;
        }
        let t = darccos(cos_h) / 15.0;
        Some(match direction {
            Direction::BeforeNoon => noon - t,
            Direction::AfterNoon => noon + t,
        })
    }

    fn asr_time(&self, factor: f64, hours: f64) -> Option<f64> {
        let decl = self.sun_position(hours).declination;
        let angle = -darccot(factor + dtan((self.latitude - decl).abs()));
        self.sun_angle_time(angle, hours, Direction::AfterNoon)
    }
}

fn julian_date(date: NaiveDate) -> f64 {
    let (mut year, mut month) = (f64::from(date.year()), f64::from(date.month()));
    let day = f64::from(date.day());
    if month <= 2.0 {
        year -= 1.0;
        month += 12.0;
    }
    let a = (year / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (year + 4716.0)).floor() + (30.6001 * (month + 1.0)).floor() + day + b - 1524.5
}

fn to_slot_time(hours: f64) -> SlotTime {
    SlotTime::from_minutes((fix_hour(hours) * 60.0).floor() as i64)
}

fn fix_angle(a: f64) -> f64 {
    a.rem_euclid(360.0)
}

fn fix_hour(h: f64) -> f64 {
    h.rem_euclid(24.0)
}

fn dsin(d: f64) -> f64 {
    d.to_radians().sin()
}

fn dcos(d: f64) -> f64 {
    d.to_radians().cos()
}

fn dtan(d: f64) -> f64 {
    d.to_radians().tan()
}

fn darcsin(x: f64) -> f64 {
    x.asin().to_degrees()
}

fn darccos(x: f64) -> f64 {
    x.acos().to_degrees()
}

fn darctan2(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

fn darccot(x: f64) -> f64 {
    (1.0 / x).atan().to_degrees()
}
