//! Core application state types.
//!
//! This module provides [`Config`] and [`SchedulerState`]: the single owned object
//! holding the time-table, the fired set, the mute flag and the playback
//! controller. It is shared between the scheduler loop and the HTTP handlers as
//! [`SharedState`], behind one async mutex, so that:
//!
//! - a mute toggle and a slot-fire check are serialized (muting never races a
//!   playback start), and
//! - a day-rollover table swap and its fired-set reset are observed together.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::constants::{
    DEFAULT_AUDIO_FILE, DEFAULT_CATCH_UP_MINUTES, DEFAULT_GEOLOCATION_TIMEOUT_SECS,
    DEFAULT_GEOLOCATION_URL, DEFAULT_PLAYERS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PORT,
    DEFAULT_STATUS_TEXT, DEFAULT_STOP_GRACE_MS, FALLBACK_LATITUDE, FALLBACK_LONGITUDE,
    FALLBACK_TIMEZONE,
};
use crate::error::{AzanError, AzanResult};
use crate::location::{LocationResult, ResolvedLocation};
use crate::playback::PlaybackController;
use crate::prayer::{
    AsrMadhab, CalculationMethod, CalculationParams, DailyTimeTable, PrayerName, SlotTime,
};
use crate::services::scheduler::MatchPolicy;
use crate::status::StatusSnapshot;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// A location given as coordinates plus an IANA timezone name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl LocationConfig {
    /// Resolves the timezone name.
    pub fn to_resolved(&self) -> LocationResult<ResolvedLocation> {
        ResolvedLocation::from_parts(self.latitude, self.longitude, &self.timezone)
    }
}

/// Configuration for the Azan daemon.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Server
    /// Localhost port for the status server.
    pub port: u16,
    /// Label shown in the status bar.
    pub status_text: String,

    // Scheduler
    /// Interval between scheduler ticks (seconds).
    pub poll_interval_secs: u64,
    /// How late (minutes) a slot may still fire after its exact minute was missed.
    /// 0 fires only on the exact minute.
    pub catch_up_minutes: u32,

    // Time-table
    pub calculation_method: CalculationMethod,
    pub asr_madhab: AsrMadhab,

    // Location
    /// Pinned location. When set, no geolocation lookup is made.
    pub location: Option<LocationConfig>,
    /// Location used when the geolocation lookup fails and nothing is known yet.
    pub fallback_location: LocationConfig,
    pub geolocation_url: String,
    pub geolocation_timeout_secs: u64,

    // Playback
    /// Audio file played at each prayer time.
    pub audio_file: PathBuf,
    /// Player executables, tried in order.
    pub players: Vec<String>,
    /// Bounded wait for a player to exit before it is killed (milliseconds).
    pub stop_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            status_text: DEFAULT_STATUS_TEXT.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            catch_up_minutes: DEFAULT_CATCH_UP_MINUTES,
            calculation_method: CalculationMethod::default(),
            asr_madhab: AsrMadhab::default(),
            location: None,
            fallback_location: LocationConfig {
                latitude: FALLBACK_LATITUDE,
                longitude: FALLBACK_LONGITUDE,
                timezone: FALLBACK_TIMEZONE.to_string(),
            },
            geolocation_url: DEFAULT_GEOLOCATION_URL.to_string(),
            geolocation_timeout_secs: DEFAULT_GEOLOCATION_TIMEOUT_SECS,
            audio_file: PathBuf::from(DEFAULT_AUDIO_FILE),
            players: DEFAULT_PLAYERS.iter().map(|p| p.to_string()).collect(),
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
        }
    }
}

impl Config {
    /// Validates the values the daemon cannot run without.
    ///
    /// Location and player settings are not checked here: bootstrap logs a bad
    /// value and falls back, so the status server still comes up.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn calculation_params(&self) -> CalculationParams {
        CalculationParams {
            method: self.calculation_method,
            asr_madhab: self.asr_madhab,
        }
    }

    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::new(self.catch_up_minutes)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler state
// ─────────────────────────────────────────────────────────────────────────────

/// Slots already triggered for the table's date.
///
/// Membership means playback was attempted, not that it succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiredSet(BTreeSet<PrayerName>);

impl FiredSet {
    pub fn contains(&self, name: PrayerName) -> bool {
        self.0.contains(&name)
    }

    /// Adds `name`, returning `false` if it was already present.
    pub fn insert(&mut self, name: PrayerName) -> bool {
        self.0.insert(name)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fired names in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = PrayerName> + '_ {
        self.0.iter().copied()
    }
}

/// All mutable scheduler state, guarded as one unit.
pub struct SchedulerState {
    table: Option<DailyTimeTable>,
    fired: FiredSet,
    muted: bool,
    playback: PlaybackController,
}

/// Handle shared by the scheduler loop and the HTTP handlers.
pub type SharedState = Arc<Mutex<SchedulerState>>;

impl SchedulerState {
    /// Creates the state with no time-table yet, unmuted.
    pub fn new(playback: PlaybackController) -> Self {
        Self {
            table: None,
            fired: FiredSet::default(),
            muted: false,
            playback,
        }
    }

    /// Wraps the state for sharing.
    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn table(&self) -> Option<&DailyTimeTable> {
        self.table.as_ref()
    }

    pub fn fired(&self) -> &FiredSet {
        &self.fired
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController {
        &mut self.playback
    }

    /// Installs a new time-table.
    ///
    /// The fired set is reset when the date changes. Replacing a table for the
    /// same date (a stale table being refreshed) keeps it, so no slot fires
    /// twice in one day.
    pub fn replace_table(&mut self, table: DailyTimeTable) {
        let same_day = self
            .table
            .as_ref()
            .is_some_and(|current| current.date() == table.date());
        if !same_day {
            self.fired.clear();
        }
        self.table = Some(table);
    }

    /// Marks every slot due at `now` under `policy` as fired.
    ///
    /// Returns the newly fired names in table order. Slots already in the fired
    /// set are never returned again for the same date.
    pub fn mark_due(&mut self, now: SlotTime, policy: MatchPolicy) -> Vec<PrayerName> {
        let Some(table) = &self.table else {
            return Vec::new();
        };
        let mut due = Vec::new();
        for slot in table.slots() {
            if policy.is_due(slot.time, now) && self.fired.insert(slot.name) {
                due.push(slot.name);
            }
        }
        due
    }

    /// Flips the mute flag, stopping any active playback when muting.
    ///
    /// Returns the new mute state. Unmuting never resumes stopped audio.
    pub async fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        if self.muted {
            match self.playback.stop().await {
                Ok(Some(termination)) => {
                    log::info!("[Mute] Stopped active playback ({:?})", termination);
                }
                Ok(None) => {}
                Err(e) => log::error!("[Mute] Failed to stop playback: {}", e),
            }
        }
        log::info!(
            "[Mute] Mute toggled -> {}",
            if self.muted { "muted" } else { "unmuted" }
        );
        self.muted
    }

    /// Builds the status snapshot for `now` without mutating anything.
    pub fn snapshot(&self, now: DateTime<Utc>, text: &str) -> AzanResult<StatusSnapshot> {
        let table = self.table.as_ref().ok_or_else(|| {
            AzanError::TimeTableUnavailable("prayer times have not been computed yet".into())
        })?;
        let local = table.local_now(now).time();
        Ok(StatusSnapshot::build(
            table,
            SlotTime::truncate(local),
            self.muted,
            text,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::playback::mock::CountingBackend;
    use crate::prayer::test_fixtures::{at, hm, sample_date, sample_table};

    fn state_with(backend: Arc<CountingBackend>, asset: &std::path::Path) -> SchedulerState {
        SchedulerState::new(PlaybackController::new(
            vec![backend as Arc<dyn crate::playback::AudioBackend>],
            asset,
            Duration::from_millis(50),
        ))
    }

    fn idle_state() -> SchedulerState {
        SchedulerState::new(PlaybackController::new(
            Vec::new(),
            "azan.mp3",
            Duration::from_millis(50),
        ))
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 4567);
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.players.first().map(String::as_str), Some("rodio"));
    }

    #[test]
    fn config_rejects_zero_poll_interval() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn recoverable_settings_pass_validation() {
        let config = Config {
            location: Some(LocationConfig {
                latitude: 0.0,
                longitude: 0.0,
                timezone: "Nowhere/Special".into(),
            }),
            players: Vec::new(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.location.unwrap().to_resolved().is_err());
    }

    #[test]
    fn mark_due_fires_each_slot_once() {
        let mut state = idle_state();
        state.replace_table(sample_table(sample_date()));
        let exact = MatchPolicy::new(0);

        assert_eq!(state.mark_due(hm(12, 15), exact), vec![PrayerName::Dhuhr]);
        assert!(state.mark_due(hm(12, 15), exact).is_empty());
        assert!(state.fired().contains(PrayerName::Dhuhr));
        assert_eq!(state.fired().len(), 1);
    }

    #[test]
    fn identical_times_fire_together_in_table_order() {
        let mut state = idle_state();
        state.replace_table(DailyTimeTable::new(
            sample_date(),
            chrono_tz::UTC,
            [hm(3, 0), hm(12, 0), hm(16, 0), hm(22, 30), hm(22, 30)],
        ));

        let due = state.mark_due(hm(22, 30), MatchPolicy::new(0));
        assert_eq!(due, vec![PrayerName::Maghrib, PrayerName::Isha]);
    }

    #[test]
    fn new_date_resets_fired_set_same_date_keeps_it() {
        let mut state = idle_state();
        let date = sample_date();
        state.replace_table(sample_table(date));
        state.mark_due(hm(5, 0), MatchPolicy::new(0));

        state.replace_table(sample_table(date).carried_over(date));
        assert!(state.fired().contains(PrayerName::Fajr));

        state.replace_table(sample_table(date.succ_opt().unwrap()));
        assert!(state.fired().is_empty());
    }

    #[test]
    fn snapshot_without_table_is_unavailable() {
        let state = idle_state();
        let err = state.snapshot(at(9, 0), "Prayer").unwrap_err();
        assert!(matches!(err, AzanError::TimeTableUnavailable(_)));
    }

    #[tokio::test]
    async fn muting_stops_playback_and_unmuting_does_not_resume() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let backend = Arc::new(CountingBackend::default());
        let mut state = state_with(backend.clone(), file.path());
        state.playback_mut().play().await.unwrap();

        assert!(state.toggle_mute().await);
        assert_eq!(backend.stops(), 1);
        assert!(!backend.is_live());

        assert!(!state.toggle_mute().await);
        assert_eq!(backend.starts(), 1);
        assert!(!state.playback_mut().has_session());
    }
}
