//! Azan Core - shared library for the Azan daemon.
//!
//! This crate computes the daily prayer time-table for the device's location,
//! fires the adhan exactly once per prayer per day and serves the current and
//! next prayer to a desktop status bar over a localhost HTTP endpoint.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`location`]: Where the device is (IP geolocation or a pinned location)
//! - [`prayer`]: Prayer names, slots, the daily time-table and its computation
//! - [`services`]: The scheduler loop
//! - [`playback`]: Playback lifecycle and external player backends
//! - [`state`]: Configuration and the shared scheduler state
//! - [`status`]: The status bar snapshot
//! - [`api`]: HTTP handlers and server startup
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple the scheduler from its
//! collaborators:
//!
//! - [`Clock`](clock::Clock): Reading wall-clock time
//! - [`LocationResolver`](location::LocationResolver): Resolving the device location
//! - [`TimeTableProvider`](prayer::TimeTableProvider): Computing a day's prayer times
//! - [`AudioBackend`](playback::AudioBackend): Starting and stopping playback
//!
//! Each trait has a production implementation wired in [`bootstrap`].

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod clock;
pub mod constants;
pub mod error;
pub mod location;
pub mod playback;
pub mod prayer;
pub mod services;
pub mod state;
pub mod status;

// Re-export commonly used types at the crate root
pub use clock::{Clock, SystemClock};
pub use error::{AzanError, AzanResult};
pub use location::{
    FixedLocationResolver, IpGeolocationResolver, LocationError, LocationResolver,
    ResolvedLocation,
};
pub use playback::{AudioBackend, PlaybackController, PlaybackError, ProcessBackend};
#[cfg(feature = "rodio")]
pub use playback::RodioBackend;
pub use prayer::{
    AsrMadhab, AstronomicalProvider, CalculationMethod, CalculationParams, DailyTimeTable,
    PrayerName, SlotTime, TimeTableProvider,
};
pub use services::{MatchPolicy, Scheduler, TickReport};
pub use state::{Config, LocationConfig, SchedulerState, SharedState};
pub use status::StatusSnapshot;

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
