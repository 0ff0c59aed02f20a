//! Prayer time scheduler.
//!
//! Responsibilities:
//! - Computing the time-table on startup and on every local-date rollover
//! - Firing each slot exactly once per day (bookkeeping even when muted)
//! - Starting playback for fired slots unless muted
//! - Keeping the previous table when a refresh fails
//!
//! Each tick reads the clock, refreshes the table if the local date moved on (or
//! the current table is stale), then matches slots, all before sleeping again.
//! The location is looked up once per local date; retries of a failed refresh
//! reuse it and only redo the computation. Errors and panics inside a tick are
//! logged and the loop keeps polling.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::{AzanError, AzanResult};
use crate::location::{LocationResolver, ResolvedLocation};
use crate::prayer::{CalcError, DailyTimeTable, PrayerName, SlotTime, TimeTableProvider};
use crate::state::SharedState;

/// When a slot counts as due.
///
/// A slot is due from its exact minute until `catch_up_minutes` later, so a tick
/// delayed past the minute (suspend, clock skew) still fires it. With 0 only the
/// exact minute matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    catch_up_minutes: u32,
}

impl MatchPolicy {
    pub fn new(catch_up_minutes: u32) -> Self {
        Self { catch_up_minutes }
    }

    /// Matches only on the slot's exact minute.
    pub fn exact() -> Self {
        Self::new(0)
    }

    pub fn is_due(&self, slot: SlotTime, now: SlotTime) -> bool {
        let late = now.minutes() - slot.minutes();
        (0..=i64::from(self.catch_up_minutes)).contains(&late)
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// A table for a new date was installed.
    pub rolled_over: bool,
    /// Slots newly marked as fired, in table order.
    pub fired: Vec<PrayerName>,
    /// Playback sessions started.
    pub played: usize,
}

/// Drives the once-per-slot firing loop.
pub struct Scheduler {
    state: SharedState,
    resolver: Arc<dyn LocationResolver>,
    provider: Arc<dyn TimeTableProvider>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    policy: MatchPolicy,
    /// Location looked up for the given local date.
    location: Mutex<Option<(NaiveDate, ResolvedLocation)>>,
    /// Token to signal the loop to stop.
    cancel_token: CancellationToken,
}

impl Scheduler {
    /// Creates a new Scheduler.
    ///
    /// # Arguments
    /// * `state` - State shared with the HTTP handlers
    /// * `resolver` - Location source, consulted once per local date
    /// * `provider` - Time-table computation
    /// * `clock` - Wall-clock source
    /// * `poll_interval` - Delay between ticks
    /// * `policy` - Slot matching policy
    /// * `cancel_token` - Stops the loop when cancelled
    pub fn new(
        state: SharedState,
        resolver: Arc<dyn LocationResolver>,
        provider: Arc<dyn TimeTableProvider>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        policy: MatchPolicy,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            state,
            resolver,
            provider,
            clock,
            poll_interval,
            policy,
            location: Mutex::new(None),
            cancel_token,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Evaluates one poll tick.
    pub async fn tick(&self) -> AzanResult<TickReport> {
        let now = self.clock.now();
        let current = self.state.lock().await.table().cloned();

        let needs_refresh = match &current {
            None => true,
            Some(table) => table.is_outdated(now) || table.is_stale(),
        };
        // Computed outside the lock: the lookup may take seconds.
        let refreshed = if needs_refresh {
            self.build_table(now, current.as_ref()).await?
        } else {
            None
        };

        let mut report = TickReport::default();
        let mut state = self.state.lock().await;

        if let Some(table) = refreshed {
            report.rolled_over = current
                .as_ref()
                .map_or(true, |previous| previous.date() != table.date());
            state.replace_table(table);
        }

        let local_now = match state.table() {
            Some(table) => SlotTime::truncate(table.local_now(now).time()),
            None => {
                return Err(AzanError::TimeTableUnavailable(
                    "initial prayer time computation failed, retrying next tick".into(),
                ))
            }
        };

        report.fired = state.mark_due(local_now, self.policy);
        for name in &report.fired {
            if state.is_muted() {
                log::info!("[Scheduler] {} time (muted)", name);
                continue;
            }
            log::info!("[Scheduler] {} time! Playing adhan", name);
            match state.playback_mut().play().await {
                Ok(_) => report.played += 1,
                Err(e) => log::error!("[Scheduler] Playback for {} failed: {}", name, e),
            }
        }

        Ok(report)
    }

    /// Returns the location for `now`'s local date.
    ///
    /// The resolver runs only when the local date differs from the one the cached
    /// location was looked up for.
    async fn location_for(&self, now: DateTime<Utc>) -> ResolvedLocation {
        let cached = *self.location.lock();
        if let Some((date, location)) = cached {
            if now.with_timezone(&location.timezone).date_naive() == date {
                return location;
            }
        }

        let location = self.resolver.resolve().await;
        let date = now.with_timezone(&location.timezone).date_naive();
        *self.location.lock() = Some((date, location));
        location
    }

    /// Computes the table for the location's current local date.
    ///
    /// On computation failure the previous table is carried over to the new date
    /// (stale, retried next tick). Returns `Ok(None)` when nothing should change
    /// and an error only when there is no previous table to fall back on.
    async fn build_table(
        &self,
        now: DateTime<Utc>,
        current: Option<&DailyTimeTable>,
    ) -> Result<Option<DailyTimeTable>, CalcError> {
        let location = self.location_for(now).await;
        let date = now.with_timezone(&location.timezone).date_naive();

        match self.provider.compute(date, &location) {
            Ok(table) => {
                log::info!(
                    "[Scheduler] Prayer times for {} ({}): {}",
                    date,
                    table.timezone(),
                    table
                        .slots()
                        .iter()
                        .map(|s| format!("{} {}", s.name, s.time))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                Ok(Some(table))
            }
            Err(e) => {
                log::error!("[TimeTable] Failed to compute prayer times for {}: {}", date, e);
                match current {
                    Some(previous) if previous.date() != date => {
                        log::warn!(
                            "[Scheduler] Reusing {} prayer times for {} until a refresh succeeds",
                            previous.date(),
                            date
                        );
                        Ok(Some(previous.carried_over(date)))
                    }
                    Some(_) => Ok(None),
                    None => Err(e),
                }
            }
        }
    }

    /// Spawns the polling loop on the current runtime.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Polls until cancelled, then stops any active playback.
    pub async fn run(self: Arc<Self>) {
        log::info!(
            "[Scheduler] Starting (poll every {:?}, {:?})",
            self.poll_interval,
            self.policy
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    log::info!("[Scheduler] Shutting down polling loop");
                    break;
                }
                _ = interval.tick() => {}
            }

            match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(Ok(report)) => {
                    if report.rolled_over {
                        log::info!("[Scheduler] New day, fired set cleared");
                    }
                }
                Ok(Err(e)) => log::error!("[Scheduler] Tick failed: {}", e),
                Err(_) => log::error!("[Scheduler] Tick panicked, continuing"),
            }
        }

        if let Err(e) = self.state.lock().await.playback_mut().stop().await {
            log::warn!("[Scheduler] Failed to stop playback on shutdown: {}", e);
        }
    }
}
