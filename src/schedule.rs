//! Schedule evaluation (spec §4.3): day-of-week + time-of-day interval
//! matching with priority tie-break, and the deliberate fail-open
//! (users)/fail-closed (doors) asymmetry when wall-clock time is unknown.
//!
//! The teacher has no notion of wall-clock schedules at all — `core1.rs`'s
//! periodic loop only knows monotonic `Instant`s — so this module is new,
//! grounded on the *shape* of `core1.rs`'s tick-driven loop (interval
//! evaluation happens once per scheduler pass against the current state,
//! same as everything else there) rather than on any specific function.

use crate::model::{DoorScheduleEntry, ScheduleInterval, ScheduleMode};

/// Wall-clock reading handed down from the clock source. `None` means no
/// NTP-synced time is available yet (spec §4.4 Open Question: wall time may
/// be absent at boot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u8,
    pub minute_of_day: u16,
}

/// Determines the schedule mode a door should currently be in.
///
/// Fails closed: with no wall clock, or no interval covering the current
/// moment, the door is `Controlled` (falls through to the normal
/// credential-matching rules) rather than implicitly unlocked or locked.
/// Ties between overlapping intervals are broken by highest `priority`,
/// then by the entry's position in the input slice (stable, first wins) —
/// this project's Open Question decision, since the spec leaves the
/// tie-break rule unspecified.
pub fn door_mode(entries: &[DoorScheduleEntry], now: Option<WallClock>) -> ScheduleMode {
    let Some(now) = now else {
        return ScheduleMode::Controlled;
    };
    let mut best: Option<&DoorScheduleEntry> = None;
    for entry in entries {
        if !entry.interval.contains(now.day_of_week, now.minute_of_day) {
            continue;
        }
        best = match best {
            None => Some(entry),
            Some(current) if entry.interval.priority > current.interval.priority => Some(entry),
            Some(current) => Some(current),
        };
    }
    best.map(|e| e.mode).unwrap_or(ScheduleMode::Controlled)
}

/// Determines whether a user's personal schedule currently permits access.
///
/// Fails open: an empty schedule list means the user has no time
/// restriction (always permitted); no wall clock available also permits,
/// since denying access to everyone whenever NTP hiccups would be a worse
/// failure mode than a stale grant (spec §4.3).
pub fn user_in_schedule(intervals: &[ScheduleInterval], now: Option<WallClock>) -> bool {
    if intervals.is_empty() {
        return true;
    }
    let Some(now) = now else {
        return true;
    };
    intervals
        .iter()
        .any(|interval| interval.contains(now.day_of_week, now.minute_of_day))
}
