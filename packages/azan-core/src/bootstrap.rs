//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root: the single place where the
//! location resolver, time-table provider, playback controller, shared state and
//! scheduler are instantiated and wired together.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::clock::{Clock, SystemClock};
use crate::constants::SERVICE_ID;
use crate::error::{AzanError, AzanResult};
use crate::location::{
    FixedLocationResolver, IpGeolocationResolver, LocationResolver, ResolvedLocation,
};
use crate::playback::{backends_for_players, PlaybackController};
use crate::prayer::{AstronomicalProvider, TimeTableProvider};
use crate::services::Scheduler;
use crate::state::{Config, SchedulerState, SharedState};

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// State shared by the scheduler and the HTTP handlers.
    pub state: SharedState,
    /// The once-per-slot firing loop.
    pub scheduler: Arc<Scheduler>,
    /// Wall-clock source.
    pub clock: Arc<dyn Clock>,
    /// Validated configuration.
    pub config: Arc<Config>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// The running scheduler loop, taken by the first shutdown.
    scheduler_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BootstrappedServices {
    /// Builds the state handed to the HTTP layer.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.state),
            Arc::clone(&self.clock),
            Arc::clone(&self.config),
        )
    }

    /// Spawns the scheduler loop. Its first tick computes the time-table.
    pub fn start_background_tasks(&self) {
        let handle = Arc::clone(&self.scheduler).start();
        if let Some(previous) = self.scheduler_task.lock().replace(handle) {
            log::warn!("[Bootstrap] Scheduler was already running, aborting the old loop");
            previous.abort();
        }
    }

    /// Gracefully shuts down all services.
    ///
    /// Stops the scheduler loop, waits a bounded time for it to exit, then stops
    /// any playback still active. Safe to call more than once.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        let task = self.scheduler_task.lock().take();
        if let Some(task) = task {
            let wait = Duration::from_millis(self.config.stop_grace_ms) + SCHEDULER_EXIT_SLACK;
            match tokio::time::timeout(wait, task).await {
                Ok(Ok(())) => log::info!("[Bootstrap] Scheduler stopped"),
                Ok(Err(e)) => log::warn!("[Bootstrap] Scheduler task ended abnormally: {}", e),
                Err(_) => log::warn!("[Bootstrap] Scheduler did not stop within {:?}", wait),
            }
        }

        match self.state.lock().await.playback_mut().stop().await {
            Ok(Some(termination)) => {
                log::info!("[Bootstrap] Stopped active playback ({:?})", termination)
            }
            Ok(None) => {}
            Err(e) => log::warn!("[Bootstrap] Failed to stop playback: {}", e),
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the HTTP client used for the geolocation lookup.
fn create_http_client(timeout: Duration) -> AzanResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(SERVICE_ID)
        .build()
        .map_err(|e| AzanError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Extra time the scheduler loop gets on shutdown beyond the playback grace.
const SCHEDULER_EXIT_SLACK: Duration = Duration::from_secs(1);

/// The pinned location, if one is configured and valid.
///
/// An invalid pinned location is logged and ignored.
fn pinned_location(config: &Config) -> Option<ResolvedLocation> {
    let pinned = config.location.as_ref()?;
    match pinned.to_resolved() {
        Ok(location) => Some(location),
        Err(e) => {
            log::error!(
                "[Bootstrap] Ignoring configured location ({}); using IP geolocation",
                e
            );
            None
        }
    }
}

/// The configured fallback location, or the built-in one if it is invalid.
fn fallback_location(config: &Config) -> ResolvedLocation {
    config.fallback_location.to_resolved().unwrap_or_else(|e| {
        log::error!(
            "[Bootstrap] Ignoring configured fallback_location ({}); using the built-in fallback",
            e
        );
        ResolvedLocation::fallback()
    })
}

/// Chooses the pinned location when configured, IP geolocation otherwise.
fn create_resolver(config: &Config) -> AzanResult<Arc<dyn LocationResolver>> {
    if let Some(location) = pinned_location(config) {
        log::info!(
            "[Bootstrap] Using pinned location ({}, {}) {}",
            location.latitude,
            location.longitude,
            location.timezone
        );
        return Ok(FixedLocationResolver::arc(location));
    }

    let timeout = Duration::from_secs(config.geolocation_timeout_secs);
    log::info!(
        "[Bootstrap] Using IP geolocation via {}",
        config.geolocation_url
    );
    Ok(Arc::new(IpGeolocationResolver::new(
        create_http_client(timeout)?,
        config.geolocation_url.clone(),
        timeout,
        fallback_location(config),
    )))
}

/// Bootstraps all application services with their dependencies.
///
/// Services are created in dependency order:
///
/// 1. Clock and location resolver (HTTP client when geolocating)
/// 2. Time-table provider
/// 3. Playback controller with one backend per configured player
/// 4. Shared scheduler state
/// 5. Scheduler (depends on all of the above)
///
/// # Errors
///
/// Returns [`AzanError::Configuration`] if the poll interval is zero.
/// Everything else degrades with a logged error so the status server stays up:
/// an invalid pinned location falls back to IP geolocation, an invalid fallback
/// location to the built-in one, and a missing audio file or empty player list
/// leaves prayer times logged but not played.
pub fn bootstrap_services(config: &Config) -> AzanResult<BootstrappedServices> {
    config.validate().map_err(AzanError::Configuration)?;

    let clock = SystemClock::arc();
    let cancel_token = CancellationToken::new();

    let resolver = create_resolver(config)?;
    let provider: Arc<dyn TimeTableProvider> =
        Arc::new(AstronomicalProvider::new(config.calculation_params()));

    if !config.audio_file.is_file() {
        log::error!(
            "[Bootstrap] Audio file {} not found; prayer times will be logged but not played",
            config.audio_file.display()
        );
    }
    if config.players.is_empty() {
        log::error!("[Bootstrap] No players configured; prayer times will be logged but not played");
    }
    let playback = PlaybackController::new(
        backends_for_players(&config.players),
        config.audio_file.clone(),
        Duration::from_millis(config.stop_grace_ms),
    );

    let state = SchedulerState::new(playback).shared();

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&state),
        resolver,
        provider,
        Arc::clone(&clock),
        Duration::from_secs(config.poll_interval_secs),
        config.match_policy(),
        cancel_token.clone(),
    ));

    Ok(BootstrappedServices {
        state,
        scheduler,
        clock,
        config: Arc::new(config.clone()),
        cancel_token,
        scheduler_task: Arc::new(Mutex::new(None)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackError;
    use crate::state::LocationConfig;

    fn pinned_config() -> Config {
        Config {
            location: Some(LocationConfig {
                latitude: 21.4225,
                longitude: 39.8262,
                timezone: "Asia/Riyadh".into(),
            }),
            audio_file: "/nonexistent/azan.mp3".into(),
            ..Config::default()
        }
    }

    #[test]
    fn http_client_builds() {
        let client = create_http_client(Duration::from_secs(5)).unwrap();
        assert!(client.get("http://example.com").build().is_ok());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        let err = bootstrap_services(&config).err().unwrap();
        assert!(matches!(err, AzanError::Configuration(_)));
    }

    #[test]
    fn misspelled_pinned_timezone_is_ignored() {
        let mut config = pinned_config();
        assert!(pinned_location(&config).is_some());

        config.location.as_mut().unwrap().timezone = "Asia/Riyad".into();
        assert!(pinned_location(&config).is_none());
    }

    #[test]
    fn invalid_fallback_uses_built_in_location() {
        let mut config = Config::default();
        config.fallback_location.timezone = "Nowhere/Special".into();
        assert_eq!(fallback_location(&config), ResolvedLocation::fallback());
    }

    #[tokio::test]
    async fn bad_location_settings_still_bootstrap() {
        let mut config = pinned_config();
        config.location.as_mut().unwrap().timezone = "Asia/Riyad".into();
        config.fallback_location.timezone = "Nowhere/Special".into();

        assert!(bootstrap_services(&config).is_ok());
    }

    #[tokio::test]
    async fn empty_player_list_still_bootstraps() {
        let asset = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            players: Vec::new(),
            audio_file: asset.path().to_path_buf(),
            ..pinned_config()
        };

        let services = bootstrap_services(&config).unwrap();

        let err = services.state.lock().await.playback_mut().play().await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoBackendAvailable));
    }

    #[tokio::test]
    async fn first_tick_computes_table_and_shutdown_is_repeatable() {
        let services = bootstrap_services(&pinned_config()).unwrap();
        services.start_background_tasks();

        let mut computed = false;
        for _ in 0..100 {
            if services.state.lock().await.table().is_some() {
                computed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(computed);
        assert_eq!(
            services.state.lock().await.table().unwrap().timezone(),
            chrono_tz::Asia::Riyadh
        );

        services.shutdown().await;
        assert!(services.scheduler_task.lock().is_none());
        services.shutdown().await;
        assert!(services.cancel_token.is_cancelled());
    }
}
