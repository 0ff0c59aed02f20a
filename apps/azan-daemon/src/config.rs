//! Daemon configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use azan_core::{AsrMadhab, CalculationMethod, LocationConfig};
use serde::Deserialize;

/// Daemon configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Localhost port for the status server.
    /// Override: `AZAN_PORT`
    pub port: u16,

    /// Label shown in the status bar.
    pub status_text: String,

    /// Seconds between scheduler ticks.
    /// Override: `AZAN_POLL_INTERVAL`
    pub poll_interval_secs: u64,

    /// Minutes a missed slot may still fire after its exact minute.
    /// Override: `AZAN_CATCH_UP_MINUTES`
    pub catch_up_minutes: u32,

    pub calculation_method: CalculationMethod,
    pub asr_madhab: AsrMadhab,

    /// Pinned location. When absent the location is looked up by IP.
    pub location: Option<LocationConfig>,

    /// Location used when the lookup fails before any lookup succeeded.
    pub fallback_location: LocationConfig,

    pub geolocation_url: String,
    pub geolocation_timeout_secs: u64,

    /// Audio file played at each prayer time.
    /// Override: `AZAN_AUDIO_FILE`
    pub audio_file: PathBuf,

    /// Player executables, tried in order.
    pub players: Vec<String>,

    /// Milliseconds a player gets to exit before it is killed.
    pub stop_grace_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let core = azan_core::Config::default();
        Self {
            port: core.port,
            status_text: core.status_text,
            poll_interval_secs: core.poll_interval_secs,
            catch_up_minutes: core.catch_up_minutes,
            calculation_method: core.calculation_method,
            asr_madhab: core.asr_madhab,
            location: core.location,
            fallback_location: core.fallback_location,
            geolocation_url: core.geolocation_url,
            geolocation_timeout_secs: core.geolocation_timeout_secs,
            audio_file: core.audio_file,
            players: core.players,
            stop_grace_ms: core.stop_grace_ms,
        }
    }
}

impl DaemonConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    ///
    /// Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(interval) = lookup("AZAN_POLL_INTERVAL").and_then(|v| v.parse().ok()) {
            self.poll_interval_secs = interval;
        }

        if let Some(minutes) = lookup("AZAN_CATCH_UP_MINUTES").and_then(|v| v.parse().ok()) {
            self.catch_up_minutes = minutes;
        }

        // AZAN_PORT and AZAN_AUDIO_FILE are handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to azan-core's Config type.
    pub fn to_core_config(&self) -> azan_core::Config {
        azan_core::Config {
            port: self.port,
            status_text: self.status_text.clone(),
            poll_interval_secs: self.poll_interval_secs,
            catch_up_minutes: self.catch_up_minutes,
            calculation_method: self.calculation_method,
            asr_madhab: self.asr_madhab,
            location: self.location.clone(),
            fallback_location: self.fallback_location.clone(),
            geolocation_url: self.geolocation_url.clone(),
            geolocation_timeout_secs: self.geolocation_timeout_secs,
            audio_file: self.audio_file.clone(),
            players: self.players.clone(),
            stop_grace_ms: self.stop_grace_ms,
        }
    }
}
