//! Monotonic and wall-clock time sources (spec §4.3, §9).
//!
//! The teacher reads `esp_hal::time::Instant::now().duration_since_epoch()`
//! once per `core1` loop pass to drive its smoltcp interface clock
//! (`core1.rs`). The hosted rewrite has no epoch-since-boot register to read,
//! so this module pins one at process start with `std::sync::OnceLock` and
//! measures monotonic milliseconds against it the same way — a single
//! `u64` the rest of the crate treats as an opaque tick count, never a wall
//! time.

use std::sync::OnceLock;
use std::time::Instant;

use chrono::{Datelike, Timelike};

use crate::schedule::WallClock;

static START: OnceLock<Instant> = OnceLock::new();

/// Milliseconds elapsed since this process started. Never wraps in any
/// deployment lifetime worth worrying about (spec doesn't ask for rollover
/// handling, unlike the teacher's 32-bit embedded tick counter).
pub fn monotonic_ms() -> u64 {
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// The current wall-clock reading, or `None` if the local clock looks
/// unset (spec §4.3 Open Question: wall time may be unavailable at boot,
/// before an NTP sync completes). A hosted OS clock is assumed sane once
/// the process has been running for more than a few seconds; this crate
/// does not itself speak NTP, matching spec §5's non-goal on time sync.
pub fn wall_clock_now() -> Option<WallClock> {
    let now = chrono::Local::now();
    if now.timestamp() < 1_600_000_000 {
        // Before 2020-09-13: almost certainly an unset RTC, not real time.
        return None;
    }
    let day_of_week = now.weekday().num_days_from_monday() as u8;
    let minute_of_day = (now.hour() * 60 + now.minute()) as u16;
    Some(WallClock { day_of_week, minute_of_day })
}

/// Renders the current wall-clock moment for an access-log entry (spec §3:
/// "YYYY-MM-DD HH:MM:SS" local time when available).
pub fn format_wall_clock_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
