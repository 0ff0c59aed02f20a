//! Status bar snapshot.
//!
//! A [`StatusSnapshot`] is derived on demand from the time-table, the current
//! local time and the mute flag. It is never stored.

use serde::Serialize;

use crate::constants::NEXT_SLOT_MARKER;
use crate::prayer::{DailyTimeTable, PrayerName, PrayerSlot, SlotTime};

/// JSON body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub text: String,
    /// One `"<name>: HH:MM"` line per slot; the next slot is bold and marked.
    pub tooltip: String,
    pub next_prayer: PrayerName,
    pub next_time: SlotTime,
    /// `"Yes"` or `"No"`.
    pub muted_status: &'static str,
}

impl StatusSnapshot {
    /// Builds the snapshot for local time `now`.
    ///
    /// The next slot is the first one strictly after `now`. Once every slot has
    /// passed, the table's first slot stands in for tomorrow's first prayer.
    pub fn build(table: &DailyTimeTable, now: SlotTime, muted: bool, text: &str) -> Self {
        let slots = table.slots();
        let next = next_slot(slots, now);
        let width = PrayerName::max_name_len();

        let tooltip = slots
            .iter()
            .map(|slot| {
                let line = format!("{:<width$}: {}", slot.name.as_str(), slot.time);
                if slot.name == next.name {
                    format!("<b>{} {}</b>", NEXT_SLOT_MARKER, line)
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            text: text.to_string(),
            tooltip,
            next_prayer: next.name,
            next_time: next.time,
            muted_status: if muted { "Yes" } else { "No" },
        }
    }
}

fn next_slot(slots: &[PrayerSlot], now: SlotTime) -> PrayerSlot {
    slots
        .iter()
        .find(|slot| slot.time > now)
        .or_else(|| slots.first())
        .copied()
        // A table always holds five slots.
        .unwrap_or(PrayerSlot {
            name: PrayerName::Fajr,
            time: now,
        })
}
