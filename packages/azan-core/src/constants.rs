//! Fixed constants and configuration defaults.
//!
//! Values in the first section are defaults that [`Config`](crate::state::Config)
//! may override. Values in the second section are fixed by the wire format consumed
//! by the status bar widget and should NOT be changed.

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default localhost port for the status server.
pub const DEFAULT_PORT: u16 = 4567;

/// Default scheduler poll interval (seconds).
///
/// The firing loop compares wall-clock time at minute resolution, so polling more
/// often than once a minute only adds redundant ticks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default audio asset played at each prayer time.
pub const DEFAULT_AUDIO_FILE: &str = "azan.mp3";

/// Default catch-up window (minutes) for slots whose exact minute was missed.
pub const DEFAULT_CATCH_UP_MINUTES: u32 = 5;

/// Bounded wait for a playback session to exit after a graceful stop request (ms).
pub const DEFAULT_STOP_GRACE_MS: u64 = 2000;

/// IP geolocation endpoint returning `{"loc": "lat,lon", "timezone": "..."}`.
pub const DEFAULT_GEOLOCATION_URL: &str = "https://ipinfo.io/json";

/// Timeout for the geolocation lookup (seconds).
pub const DEFAULT_GEOLOCATION_TIMEOUT_SECS: u64 = 5;

/// Fallback location used when geolocation fails (Makkah).
pub const FALLBACK_LATITUDE: f64 = 21.4225;
pub const FALLBACK_LONGITUDE: f64 = 39.8262;
pub const FALLBACK_TIMEZONE: &str = "Asia/Riyadh";

/// Player name that selects in-process decoding instead of an executable.
pub const LIBRARY_PLAYER: &str = "rodio";

/// Players tried in order when starting playback.
pub const DEFAULT_PLAYERS: [&str; 6] = [LIBRARY_PLAYER, "cvlc", "vlc", "mpv", "ffplay", "play"];

// ─────────────────────────────────────────────────────────────────────────────
// Status wire format
// ─────────────────────────────────────────────────────────────────────────────

/// Static label shown in the status bar.
pub const DEFAULT_STATUS_TEXT: &str = "Prayer";

/// Marker prepended to the next upcoming slot in the tooltip.
pub const NEXT_SLOT_MARKER: &str = "●";

/// Service identifier sent as the HTTP user agent.
pub const SERVICE_ID: &str = "azan-daemon";
