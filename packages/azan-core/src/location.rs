//! Device location and timezone resolution.
//!
//! Resolution never fails: a lookup error degrades to the last location that
//! resolved successfully, then to a fixed fallback, so the daemon always has
//! *some* schedule. A failed lookup is not retried within the call; the next
//! time-table refresh tries again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;

use crate::constants::{FALLBACK_LATITUDE, FALLBACK_LONGITUDE};

/// A place on earth plus the timezone its wall clock follows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Tz,
    /// Offset from UTC at resolve time, in hours.
    pub utc_offset_hours: f64,
}

impl ResolvedLocation {
    /// Creates a location, deriving the current UTC offset from `timezone`.
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Self {
        let offset = timezone
            .offset_from_utc_datetime(&Utc::now().naive_utc())
            .fix()
            .local_minus_utc();
        Self {
            latitude,
            longitude,
            timezone,
            utc_offset_hours: f64::from(offset) / 3600.0,
        }
    }

    /// Creates a location from an IANA timezone name.
    pub fn from_parts(latitude: f64, longitude: f64, timezone: &str) -> LocationResult<Self> {
        let tz = timezone
            .parse::<Tz>()
            .map_err(|_| LocationError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self::new(latitude, longitude, tz))
    }

    /// Makkah, used when nothing better is known.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_LATITUDE, FALLBACK_LONGITUDE, chrono_tz::Asia::Riyadh)
    }

    /// UTC offset in hours in effect at 12:00 UTC on `date`.
    pub fn utc_offset_hours_on(&self, date: NaiveDate) -> f64 {
        let noon = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        let offset = self
            .timezone
            .offset_from_utc_datetime(&noon)
            .fix()
            .local_minus_utc();
        f64::from(offset) / 3600.0
    }
}

/// Errors that can occur during a geolocation lookup.
#[derive(Debug, Error)]
pub enum LocationError {
    /// Transport error, timeout or undecodable body.
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("geolocation service returned HTTP {0}")]
    HttpStatus(u16),

    /// The `loc` field was not a `"lat,lon"` pair.
    #[error("malformed loc field: {0:?}")]
    MalformedLoc(String),

    /// The timezone name is not a known IANA zone.
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Result alias for geolocation lookups.
pub type LocationResult<T> = Result<T, LocationError>;

/// Resolves the device location. Never fails.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn resolve(&self) -> ResolvedLocation;
}

/// Location pinned by configuration; no network access.
#[derive(Debug, Clone)]
pub struct FixedLocationResolver {
    location: ResolvedLocation,
}

impl FixedLocationResolver {
    pub fn new(location: ResolvedLocation) -> Self {
        Self { location }
    }

    pub fn arc(location: ResolvedLocation) -> Arc<dyn LocationResolver> {
        Arc::new(Self::new(location))
    }
}

#[async_trait]
impl LocationResolver for FixedLocationResolver {
    async fn resolve(&self) -> ResolvedLocation {
        // Recompute the offset so a long-running daemon follows DST changes.
        ResolvedLocation::new(
            self.location.latitude,
            self.location.longitude,
            self.location.timezone,
        )
    }
}

/// Payload returned by ipinfo-compatible services.
#[derive(Debug, Deserialize)]
struct IpInfoPayload {
    loc: String,
    timezone: String,
}

impl IpInfoPayload {
    fn into_location(self) -> LocationResult<ResolvedLocation> {
        let (lat, lon) = self
            .loc
            .split_once(',')
            .ok_or_else(|| LocationError::MalformedLoc(self.loc.clone()))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| LocationError::MalformedLoc(self.loc.clone()))?;
        let longitude = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| LocationError::MalformedLoc(self.loc.clone()))?;
        ResolvedLocation::from_parts(latitude, longitude, &self.timezone)
    }
}

/// Resolver backed by an IP geolocation HTTP service.
pub struct IpGeolocationResolver {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    fallback: ResolvedLocation,
    /// Last location that resolved successfully, preferred over `fallback`.
    last_known: RwLock<Option<ResolvedLocation>>,
}

impl IpGeolocationResolver {
    /// Creates a resolver.
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `url` - Service endpoint returning `{"loc": "lat,lon", "timezone": "..."}`
    /// * `timeout` - Upper bound on the whole lookup
    /// * `fallback` - Location used when no lookup has ever succeeded
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        timeout: Duration,
        fallback: ResolvedLocation,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            fallback,
            last_known: RwLock::new(None),
        }
    }

    /// Performs a single lookup without any fallback.
    pub async fn lookup(&self) -> LocationResult<ResolvedLocation> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LocationError::HttpStatus(status.as_u16()));
        }
        let payload: IpInfoPayload = response.json().await?;
        payload.into_location()
    }
}

#[async_trait]
impl LocationResolver for IpGeolocationResolver {
    async fn resolve(&self) -> ResolvedLocation {
        match self.lookup().await {
            Ok(location) => {
                log::info!(
                    "[Location] Resolved ({:.4}, {:.4}) in {}",
                    location.latitude,
                    location.longitude,
                    location.timezone
                );
                *self.last_known.write() = Some(location);
                location
            }
            Err(e) => {
                let last_known = *self.last_known.read();
                match last_known {
                    Some(previous) => {
                        log::warn!(
                            "[Location] Lookup failed ({}), keeping last known location in {}",
                            e,
                            previous.timezone
                        );
                        ResolvedLocation::new(
                            previous.latitude,
                            previous.longitude,
                            previous.timezone,
                        )
                    }
                    None => {
                        log::warn!(
                            "[Location] Lookup failed ({}), using fallback location in {}",
                            e,
                            self.fallback.timezone
                        );
                        self.fallback
                    }
                }
            }
        }
    }
}
