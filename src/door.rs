//! Per-door lock state machine (spec §4.5).
//!
//! Grounded on the teacher's `core0::pulse_door` (momentary relay pulse) and
//! `shared.rs`'s emergency/override bookkeeping, generalized from one door
//! to the per-`DoorId` table the spec requires, and from a fixed 200ms pulse
//! to a per-door configurable `momentary_unlock_ms`. The relay is modeled
//! as derived state (spec §3 invariant) rather than a single stored enum:
//! it is recomputed from the door's own override, the board-wide emergency
//! state, the scheduled-hold flag, and the momentary-unlock window every
//! time any of those inputs changes.

use crate::model::{Override, ScheduleMode};

/// How long the relay should stay energized for, expressed as a point in
/// monotonic time. `Indefinite` models a schedule-driven unlock window,
/// which has no natural expiry of its own — it ends only when the schedule
/// or an override changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnlockWindow {
    Closed,
    Until(u64),
    Indefinite,
}

/// The state machine for a single door. All methods are pure transitions on
/// monotonic milliseconds so they're testable without a clock.
#[derive(Debug, Clone)]
pub struct DoorState {
    pub name: String,
    pub momentary_unlock_ms: u64,
    relay_on: bool,
    unlock_window: UnlockWindow,
    pub emergency_override: Override,
    board_emergency: Override,
    pub current_schedule_mode: ScheduleMode,
}

impl DoorState {
    pub fn new(name: impl Into<String>, momentary_unlock_ms: u64) -> Self {
        Self {
            name: name.into(),
            momentary_unlock_ms,
            relay_on: false,
            unlock_window: UnlockWindow::Closed,
            emergency_override: Override::None,
            board_emergency: Override::None,
            current_schedule_mode: ScheduleMode::Controlled,
        }
    }

    pub fn relay_on(&self) -> bool {
        self.relay_on
    }

    pub fn is_held_open_by_schedule(&self) -> bool {
        matches!(self.unlock_window, UnlockWindow::Indefinite)
    }

    fn momentary_active(&self, now_ms: u64) -> bool {
        matches!(self.unlock_window, UnlockWindow::Until(until) if now_ms < until)
    }

    /// Recomputes `relay_on` from the spec §3 invariant: high iff any of
    /// (door emergency unlock, board emergency unlock, scheduled hold,
    /// momentary window active), UNLESS either emergency source says
    /// `lock`, which forces it low regardless of the others.
    fn recompute(&mut self, now_ms: u64) {
        if self.emergency_override == Override::Lock || self.board_emergency == Override::Lock {
            self.relay_on = false;
            return;
        }
        self.relay_on = self.emergency_override == Override::Unlock
            || self.board_emergency == Override::Unlock
            || self.is_held_open_by_schedule()
            || self.momentary_active(now_ms);
    }

    /// Grants a momentary unlock (credential match or REX). No-op if the
    /// door is already held open by its schedule — there's nothing to
    /// extend. Otherwise sets (or refreshes forward) the expiry; the
    /// relay's actual state is still governed by `recompute` so a lockdown
    /// in effect at the same instant is not overridden by this call.
    ///
    /// Refreshing always moves the expiry forward in wall-clock terms,
    /// since `now` only increases between calls — there is no ceiling on
    /// how many times a door can be re-triggered before it relocks (spec
    /// §4.5 Open Question: no extension ceiling).
    pub fn momentary_unlock(&mut self, now_ms: u64) {
        if self.is_held_open_by_schedule() {
            return;
        }
        self.unlock_window = UnlockWindow::Until(now_ms + self.momentary_unlock_ms);
        self.recompute(now_ms);
    }

    /// Applies a new schedule mode. Idempotent: re-applying the same mode
    /// does nothing, so periodic schedule re-evaluation can run every tick
    /// without spuriously re-triggering relay actuation (spec §4.5,
    /// "Schedule re-evaluations are idempotent and may be coalesced").
    pub fn apply_schedule_mode(&mut self, mode: ScheduleMode, now_ms: u64) {
        if mode == self.current_schedule_mode {
            return;
        }
        self.current_schedule_mode = mode;
        match mode {
            ScheduleMode::Unlock => self.unlock_window = UnlockWindow::Indefinite,
            ScheduleMode::Controlled | ScheduleMode::Locked => {
                if self.is_held_open_by_schedule() {
                    self.unlock_window = UnlockWindow::Closed;
                }
            }
        }
        self.recompute(now_ms);
    }

    /// Cancels an active scheduled hold (spec §4.5: an emergency lock,
    /// door or board, cancels `scheduled_hold`). Also resets
    /// `current_schedule_mode` back to `Controlled` so that a later
    /// re-evaluation finding the schedule still says `Unlock` is seen as a
    /// change and re-asserts the hold — otherwise `apply_schedule_mode`'s
    /// idempotency check would treat "still Unlock" as a no-op forever.
    fn cancel_scheduled_hold(&mut self) {
        if self.is_held_open_by_schedule() {
            self.unlock_window = UnlockWindow::Closed;
        }
        self.current_schedule_mode = ScheduleMode::Controlled;
    }

    /// Sets this door's own emergency override (spec §4.4/§4.5 "door
    /// emergency"), independent of the board-wide emergency state.
    pub fn set_emergency(&mut self, state: Override, now_ms: u64) {
        self.emergency_override = state;
        if state == Override::Lock {
            self.cancel_scheduled_hold();
        }
        self.recompute(now_ms);
    }

    /// Sets the board-wide emergency state as seen by this door. Kept
    /// separate from `emergency_override` so clearing one doesn't disturb
    /// the other — both are independent sources the relay invariant ORs
    /// together (spec §3).
    pub fn set_board_emergency(&mut self, state: Override, now_ms: u64) {
        self.board_emergency = state;
        if state == Override::Lock {
            self.cancel_scheduled_hold();
        }
        self.recompute(now_ms);
    }

    /// Periodic housekeeping: de-asserts the relay exactly once when a
    /// momentary window expires. Safe to call every scheduler tick.
    pub fn tick_expiry(&mut self, now_ms: u64) {
        if let UnlockWindow::Until(until) = self.unlock_window {
            if now_ms >= until {
                self.unlock_window = UnlockWindow::Closed;
            }
        }
        self.recompute(now_ms);
    }
}
