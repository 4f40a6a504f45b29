//! The single owned `CoreState` (spec §9's central redesign instruction)
//! and the commands that mutate it.
//!
//! Grounded on the teacher's `core0::run`/`core1::run` loop shape (a
//! `loop {}` reading state, branching, feeding the watchdog) collapsed into
//! one owner since the hosted rewrite has no second physical core to
//! exploit. Every other task — the HTTP admin surface, the periodic
//! scheduler, and (eventually) real GPIO edge capture — talks to
//! `CoreState` by sending an [`EngineCommand`] over a channel rather than
//! sharing a lock, matching spec §9's "no need for locks under the
//! single-task model."

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::decision::{self, DoorView, Presented, Verdict};
use crate::door::DoorState;
use crate::error::{CoreError, Reason};
use crate::identity::PresentedCard;
use crate::ledger::UsageLedger;
use crate::log_queue::LogQueue;
use crate::model::{
    AccessLogEntry, CredentialType, DoorConfig, DoorId, DoorScheduleEntry, Override, ScheduleInterval,
    Snapshot, TempCode, User,
};
use crate::schedule::{self, WallClock};
use crate::wiegand::{Edge, Frame, FrameAssembler, KeyPress, PinAssembler, PinOutcome};

/// Commands accepted from the HTTP admin surface (spec §6) and other
/// producers. Each carries a `oneshot` reply channel so the caller can
/// await the effect without the engine task needing to know anything about
/// HTTP.
pub enum EngineCommand {
    Sync {
        snapshot: Box<Snapshot>,
        respond_to: oneshot::Sender<Result<(), CoreError>>,
    },
    EmergencyLock {
        respond_to: oneshot::Sender<()>,
    },
    EmergencyUnlock {
        auto_reset_after: Option<Duration>,
        respond_to: oneshot::Sender<()>,
    },
    EmergencyReset {
        respond_to: oneshot::Sender<()>,
    },
    DoorOverride {
        door: DoorId,
        state: Override,
        respond_to: oneshot::Sender<()>,
    },
    /// A manual/REX-equivalent unlock trigger, e.g. an admin "unlock now"
    /// action (spec §4.5: treated as a grant with principal "REX").
    ManualUnlock {
        door: DoorId,
        respond_to: oneshot::Sender<()>,
    },
    EdgeEvent {
        door: DoorId,
        edge: Edge,
        at: Duration,
    },
    KeypadEvent {
        door: DoorId,
        key: KeyPress,
    },
}

/// Per-door wiring the engine owns in addition to the relay state: the
/// Wiegand frame assembler and the door's entry in the schedule table.
struct DoorRuntime {
    state: DoorState,
    frames: FrameAssembler,
}

/// The owned, single-writer core state (spec §9). Never shared behind a
/// lock: exactly one task (`run_engine`) mutates it, driven by
/// [`EngineCommand`]s and periodic ticks.
pub struct CoreState {
    doors: HashMap<DoorId, DoorRuntime>,
    door_schedules: HashMap<DoorId, Vec<DoorScheduleEntry>>,
    users: Vec<User>,
    user_schedules: HashMap<String, Vec<ScheduleInterval>>,
    temp_codes: Vec<TempCode>,
    ledger: UsageLedger,
    log_queue: LogQueue,
    /// Pending temp-code usage reports awaiting delivery to the controller
    /// (spec §4.4.b: "schedule an asynchronous usage report"). Same
    /// peek/commit discipline as `log_queue`, unbounded since a usage
    /// report is only ever queued once per grant and temp-code traffic is
    /// low-volume relative to the access log.
    usage_reports: VecDeque<(String, DoorId)>,
    pins: PinAssembler,
    board_emergency: Override,
    emergency_auto_reset_at: Option<u64>,
    wall_clock: Option<WallClock>,
    pub controller_online: bool,
}

impl CoreState {
    pub fn new(door_configs: HashMap<DoorId, DoorConfig>) -> Self {
        let doors = DoorId::ALL
            .into_iter()
            .map(|id| {
                let config = door_configs.get(&id);
                let name = config.map(|c| c.name.clone()).unwrap_or_else(|| id.to_string());
                let momentary_ms = config.map(|c| c.momentary_unlock_ms).unwrap_or(5_000);
                (
                    id,
                    DoorRuntime {
                        state: DoorState::new(name, momentary_ms),
                        frames: FrameAssembler::new(),
                    },
                )
            })
            .collect();
        Self {
            doors,
            door_schedules: HashMap::new(),
            users: Vec::new(),
            user_schedules: HashMap::new(),
            temp_codes: Vec::new(),
            ledger: UsageLedger::new(),
            log_queue: LogQueue::new(),
            usage_reports: VecDeque::new(),
            pins: PinAssembler::new(),
            board_emergency: Override::None,
            emergency_auto_reset_at: None,
            wall_clock: None,
            controller_online: false,
        }
    }

    pub fn set_wall_clock(&mut self, wall_clock: Option<WallClock>) {
        self.wall_clock = wall_clock;
    }

    pub fn door_relay_on(&self, door: DoorId) -> bool {
        self.doors.get(&door).map(|d| d.state.relay_on()).unwrap_or(false)
    }

    pub fn log_queue_mut(&mut self) -> &mut LogQueue {
        &mut self.log_queue
    }

    /// Oldest pending temp-code usage report, paired with this node's
    /// current per-door use count for that code (spec §4.8 outbound
    /// `current_uses` field), without removing it.
    pub fn peek_usage_report(&self) -> Option<(String, DoorId, u32)> {
        let (code, door) = self.usage_reports.front()?;
        Some((code.clone(), *door, self.ledger.uses(code, *door)))
    }

    /// Removes the oldest pending usage report after a confirmed delivery.
    pub fn commit_usage_report(&mut self) {
        self.usage_reports.pop_front();
    }

    /// Feeds one electrical edge into the named door's frame assembler. If
    /// the inter-bit timeout has since elapsed the caller is responsible
    /// for calling [`CoreState::poll_frame_timeouts`] to finalize it —
    /// edge capture itself never blocks on a timer (spec §4.1).
    pub fn on_edge(&mut self, door: DoorId, edge: Edge, at: Duration) {
        if let Some(runtime) = self.doors.get_mut(&door) {
            runtime.frames.on_edge(edge, at);
        }
    }

    /// Call once per scheduler tick: finalizes any door whose own frame
    /// assembler has gone more than `BIT_TIMEOUT` since its last edge, and
    /// dispatches the result (spec §4.1). Each door's timeout is tracked
    /// independently by its own `FrameAssembler`, so an edge on door 1
    /// never resets door 2's timeout.
    pub fn poll_frame_timeouts(&mut self, now_ms: u64) {
        let door_ids: Vec<DoorId> = self.doors.keys().copied().collect();
        let now = Duration::from_millis(now_ms);
        for door in door_ids {
            let frame = {
                let runtime = self.doors.get_mut(&door).expect("door exists");
                runtime.frames.poll(now)
            };
            if let Some(frame) = frame {
                self.dispatch_frame(door, frame, now_ms);
            }
        }
    }

    fn dispatch_frame(&mut self, door: DoorId, frame: Frame, now_ms: u64) {
        match frame {
            Frame::Card { facility, card } => {
                let presented = Presented::Card(PresentedCard { facility, card });
                self.attempt(door, presented, now_ms);
            }
            Frame::Key(key) => self.on_keypad_key(door, key, now_ms),
            Frame::UnknownBitCount(bits) => {
                warn!(door = %door, bits, "wiegand: frame with unrecognized bit count discarded");
                self.push_discard_log(door, Reason::FrameUnknownBitcount, now_ms);
            }
        }
    }

    /// Feeds a decoded keypad event (digit/star/hash) into the shared PIN
    /// assembler (spec §4.2) and, on submit, runs the resulting PIN through
    /// the decision engine.
    pub fn on_keypad_key(&mut self, door: DoorId, key: KeyPress, now_ms: u64) {
        let door_num = door.number();
        let outcome = match key {
            KeyPress::Digit(d) => self.pins.on_digit(door_num, d, Duration::from_millis(now_ms)),
            KeyPress::Star => self.pins.on_clear(),
            KeyPress::Hash => self.pins.on_submit(door_num),
        };
        match outcome {
            PinOutcome::Submit { door: submit_door, pin } => {
                let door = DoorId::from_number(submit_door).unwrap_or(door);
                self.attempt(door, Presented::Pin(pin), now_ms);
            }
            PinOutcome::TooShortOrWrongDoor => {
                let reason = Reason::PinTooShort;
                self.push_discard_log(door, reason, now_ms);
            }
            PinOutcome::Cancelled | PinOutcome::Pending | PinOutcome::TimedOut => {}
        }
    }

    /// Polls the PIN assembler's idle timeout (spec §4.2: SHOULD be polled
    /// no more often than every 5s).
    pub fn poll_pin_idle_timeout(&mut self, now_ms: u64) {
        self.pins.check_idle(Duration::from_millis(now_ms));
    }

    /// Runs a presented credential through the decision engine, actuates
    /// the door, records usage, and queues the access log entry. Shared by
    /// the card path, the PIN submit path, and REX.
    fn attempt(&mut self, door: DoorId, presented: Presented, now_ms: u64) {
        let Some(runtime) = self.doors.get(&door) else {
            return;
        };
        let door_view = DoorView {
            emergency_override: runtime.state.emergency_override,
            current_schedule_mode: runtime.state.current_schedule_mode,
        };
        let verdict = decision::resolve(
            door,
            &door_view,
            self.board_emergency,
            &presented,
            &self.users,
            &self.temp_codes,
            &self.user_schedules,
            &self.ledger,
            self.wall_clock,
        );

        if verdict.granted {
            if let Some(code) = &verdict.temp_code_used {
                self.ledger.record_use(code, door);
                self.usage_reports.push_back((code.clone(), door));
            }
            if let Some(runtime) = self.doors.get_mut(&door) {
                runtime.state.momentary_unlock(now_ms);
            }
            info!(door = %door, principal = %verdict.principal, reason = verdict.reason.code(), "access granted");
        } else {
            warn!(door = %door, principal = %verdict.principal, reason = verdict.reason.code(), "access denied");
        }

        self.push_log(door, &presented, &verdict, now_ms);
    }

    /// A request-to-exit pushbutton event (spec §4.5).
    pub fn rex(&mut self, door: DoorId, now_ms: u64) {
        self.attempt(door, Presented::Rex, now_ms);
    }

    fn push_log(&mut self, door: DoorId, presented: &Presented, verdict: &Verdict, now_ms: u64) {
        let entry = AccessLogEntry {
            timestamp: self.render_timestamp(now_ms),
            door,
            principal: verdict.principal.clone(),
            credential: presented.credential_string(),
            credential_type: verdict.credential_type,
            granted: verdict.granted,
            reason: verdict.reason.text().to_string(),
            reason_code: verdict.reason.code().to_string(),
            monotonic_ms: now_ms,
        };
        self.log_queue.push(entry);
    }

    fn push_discard_log(&mut self, door: DoorId, reason: Reason, now_ms: u64) {
        let entry = AccessLogEntry {
            timestamp: self.render_timestamp(now_ms),
            door,
            principal: decision::PRINCIPAL_UNKNOWN.to_string(),
            credential: String::new(),
            credential_type: CredentialType::Manual,
            granted: false,
            reason: reason.text().to_string(),
            reason_code: reason.code().to_string(),
            monotonic_ms: now_ms,
        };
        self.log_queue.push(entry);
    }

    fn render_timestamp(&self, now_ms: u64) -> String {
        match self.wall_clock {
            Some(_) => crate::clock::format_wall_clock_now(),
            None => now_ms.to_string(),
        }
    }

    /// Re-evaluates every door's schedule mode against the current wall
    /// clock (spec §4.3). Idempotent; safe to call every tick.
    pub fn reevaluate_schedules(&mut self, now_ms: u64) {
        for (door, runtime) in self.doors.iter_mut() {
            let entries = self.door_schedules.get(door).map(Vec::as_slice).unwrap_or(&[]);
            let mode = schedule::door_mode(entries, self.wall_clock);
            runtime.state.apply_schedule_mode(mode, now_ms);
        }
    }

    /// Per-door momentary-unlock expiry housekeeping (spec §4.5).
    pub fn tick_doors(&mut self, now_ms: u64) {
        for runtime in self.doors.values_mut() {
            runtime.state.tick_expiry(now_ms);
        }
    }

    /// Checks whether a board-wide emergency unlock's auto-reset deadline
    /// has passed, and if so clears it back to `None` (spec §3 "Board
    /// emergency").
    pub fn check_emergency_auto_reset(&mut self, now_ms: u64) {
        if let Some(deadline) = self.emergency_auto_reset_at {
            if now_ms >= deadline {
                info!("board emergency auto-reset deadline reached, clearing");
                self.set_board_emergency(Override::None, now_ms);
            }
        }
    }

    pub fn set_board_emergency(&mut self, state: Override, now_ms: u64) {
        self.board_emergency = state;
        if state != Override::Unlock {
            self.emergency_auto_reset_at = None;
        }
        for runtime in self.doors.values_mut() {
            runtime.state.set_board_emergency(state, now_ms);
        }
    }

    pub fn set_door_override(&mut self, door: DoorId, state: Override, now_ms: u64) {
        if let Some(runtime) = self.doors.get_mut(&door) {
            runtime.state.set_emergency(state, now_ms);
        }
    }

    /// Replaces the named category from a controller sync snapshot. Each
    /// *present* category is swapped atomically — no partial updates (spec
    /// §6) — regardless of whether it's empty: `{"users": []}` is a present
    /// (empty) category and clears the roster, which is why these fields
    /// are `Option` rather than gated on `is_empty()`.
    pub fn ingest_snapshot(&mut self, snapshot: Snapshot, now_ms: u64) {
        if let Some(users) = snapshot.users {
            self.users = users;
        }
        if let Some(user_schedules) = snapshot.user_schedules {
            self.user_schedules = user_schedules;
        }
        if let Some(door_schedules) = snapshot.door_schedules {
            self.door_schedules = door_schedules;
        }
        if !snapshot.doors.is_empty() {
            for (door, config) in &snapshot.doors {
                if let Some(runtime) = self.doors.get_mut(door) {
                    runtime.state.name = config.name.clone();
                    runtime.state.momentary_unlock_ms = config.momentary_unlock_ms;
                }
            }
        }
        if let Some(temp_codes) = snapshot.temp_codes {
            for code in &temp_codes {
                if code.active && code.current_uses == 0 {
                    self.ledger.reset(&code.code);
                }
            }
            self.temp_codes = temp_codes;
        }
        self.reevaluate_schedules(now_ms);
    }
}

/// Applies one [`EngineCommand`] to `state`. The only place commands are
/// turned into mutations; called from the `scheduler` module's single
/// `tokio::select!` loop so that periodic housekeeping and command handling
/// never run concurrently against the same `CoreState` (spec §9).
pub fn handle_command(state: &mut CoreState, command: EngineCommand) {
    let now_ms = crate::clock::monotonic_ms();
    match command {
        EngineCommand::Sync { snapshot, respond_to } => {
            state.ingest_snapshot(*snapshot, now_ms);
            let _ = respond_to.send(Ok(()));
        }
        EngineCommand::EmergencyLock { respond_to } => {
            state.set_board_emergency(Override::Lock, now_ms);
            let _ = respond_to.send(());
        }
        EngineCommand::EmergencyUnlock { auto_reset_after, respond_to } => {
            state.set_board_emergency(Override::Unlock, now_ms);
            state.emergency_auto_reset_at = auto_reset_after.map(|d| now_ms + d.as_millis() as u64);
            let _ = respond_to.send(());
        }
        EngineCommand::EmergencyReset { respond_to } => {
            state.set_board_emergency(Override::None, now_ms);
            let _ = respond_to.send(());
        }
        EngineCommand::DoorOverride { door, state: s, respond_to } => {
            state.set_door_override(door, s, now_ms);
            let _ = respond_to.send(());
        }
        EngineCommand::ManualUnlock { door, respond_to } => {
            state.rex(door, now_ms);
            let _ = respond_to.send(());
        }
        EngineCommand::EdgeEvent { door, edge, at } => {
            state.on_edge(door, edge, at);
        }
        EngineCommand::KeypadEvent { door, key } => {
            state.on_keypad_key(door, key, now_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardCredential, DoorConfig, UsagePolicy};

    fn fresh_state() -> CoreState {
        let mut configs = HashMap::new();
        configs.insert(DoorId::One, DoorConfig { name: "Front".to_string(), momentary_unlock_ms: 3_000 });
        configs.insert(DoorId::Two, DoorConfig { name: "Back".to_string(), momentary_unlock_ms: 3_000 });
        CoreState::new(configs)
    }

    /// Spec §8 scenario 1: a normal card grant energizes the relay for the
    /// door's configured momentary window, then drops it.
    #[test]
    fn normal_card_grant_unlocks_and_expires() {
        let mut state = fresh_state();
        state.users.push(User {
            name: "Alice".to_string(),
            active: true,
            cards: vec![CardCredential::Full { facility: 30, card: 33993 }],
            pins: vec![],
            doors: vec![DoorId::One],
        });
        state.attempt(
            DoorId::One,
            Presented::Card(PresentedCard { facility: 30, card: 33993 }),
            0,
        );
        assert!(state.door_relay_on(DoorId::One));
        let entry = state.log_queue.peek().unwrap();
        assert_eq!(entry.principal, "Alice");
        assert!(entry.granted);

        state.tick_doors(3_000);
        assert!(!state.door_relay_on(DoorId::One));
    }

    /// Spec §8 scenario 2: leading zeros on the facility code don't change
    /// identity.
    #[test]
    fn leading_zero_facility_still_matches() {
        let mut state = fresh_state();
        state.users.push(User {
            name: "Alice".to_string(),
            active: true,
            cards: vec![CardCredential::Full { facility: 30, card: 33993 }],
            pins: vec![],
            doors: vec![DoorId::One],
        });
        state.attempt(
            DoorId::One,
            Presented::Card(PresentedCard { facility: 30, card: 33993 }),
            0,
        );
        assert!(state.door_relay_on(DoorId::One));
    }

    /// A granted temp-code use is also queued as a usage report (spec
    /// §4.4.b: "schedule an asynchronous usage report to the controller"),
    /// carrying this node's per-door count, and only dequeued once the
    /// caller confirms delivery — never on peek alone.
    #[test]
    fn temp_code_grant_queues_a_usage_report_with_current_door_count() {
        let mut state = fresh_state();
        state.temp_codes.push(TempCode {
            code: "4321".to_string(),
            name: None,
            doors: vec![DoorId::One],
            policy: UsagePolicy::Unlimited,
            active: true,
            current_uses: 0,
        });
        assert!(state.peek_usage_report().is_none());

        state.attempt(DoorId::One, Presented::Pin("4321".to_string()), 0);
        let (code, door, uses) = state.peek_usage_report().expect("usage report queued on grant");
        assert_eq!(code, "4321");
        assert_eq!(door, DoorId::One);
        assert_eq!(uses, 1);
        assert!(state.peek_usage_report().is_some(), "peek does not remove the pending report");

        state.attempt(DoorId::One, Presented::Pin("4321".to_string()), 10);
        state.commit_usage_report();
        let (_, _, uses) = state.peek_usage_report().expect("second use queued another report");
        assert_eq!(uses, 2);
        state.commit_usage_report();
        assert!(state.peek_usage_report().is_none());
    }

    /// Spec §8 scenario 4: a one-time temp code is exhausted per door, not
    /// globally, and a server-driven reset reopens it.
    #[test]
    fn temp_code_one_time_per_door_and_server_reset() {
        let mut state = fresh_state();
        state.temp_codes.push(TempCode {
            code: "9988".to_string(),
            name: Some("Guest".to_string()),
            doors: vec![DoorId::One, DoorId::Two],
            policy: UsagePolicy::OneTime,
            active: true,
            current_uses: 0,
        });

        state.attempt(DoorId::One, Presented::Pin("9988".to_string()), 0);
        assert!(state.log_queue.peek().unwrap().granted);
        state.log_queue.commit();

        state.attempt(DoorId::One, Presented::Pin("9988".to_string()), 10);
        assert!(!state.log_queue.peek().unwrap().granted);
        state.log_queue.commit();

        state.attempt(DoorId::Two, Presented::Pin("9988".to_string()), 20);
        assert!(state.log_queue.peek().unwrap().granted, "door 2 is independent of door 1's usage");
        state.log_queue.commit();

        state.ingest_snapshot(
            Snapshot {
                temp_codes: Some(vec![TempCode {
                    code: "9988".to_string(),
                    name: Some("Guest".to_string()),
                    doors: vec![DoorId::One, DoorId::Two],
                    policy: UsagePolicy::OneTime,
                    active: true,
                    current_uses: 0,
                }]),
                ..Default::default()
            },
            30,
        );
        state.attempt(DoorId::One, Presented::Pin("9988".to_string()), 40);
        assert!(state.log_queue.peek().unwrap().granted, "server reset reopens door 1");
    }

    /// Spec §8 scenario 5: a board-wide emergency lock overrides a door
    /// currently held open by schedule, and emergency-reset restores it.
    #[test]
    fn board_emergency_lock_then_reset() {
        let mut state = fresh_state();
        state.door_schedules.insert(
            DoorId::Two,
            vec![DoorScheduleEntry {
                interval: ScheduleInterval { day_of_week: 0, start_minute: 0, end_minute: 24 * 60, priority: 0 },
                mode: crate::model::ScheduleMode::Unlock,
            }],
        );
        state.set_wall_clock(Some(WallClock { day_of_week: 0, minute_of_day: 600 }));
        state.reevaluate_schedules(0);
        assert!(state.door_relay_on(DoorId::Two));

        state.set_board_emergency(Override::Lock, 100);
        assert!(!state.door_relay_on(DoorId::Two));

        state.attempt(DoorId::Two, Presented::Pin("0000".to_string()), 200);
        assert!(!state.log_queue.peek().unwrap().granted);
        assert_eq!(state.log_queue.peek().unwrap().reason_code, "emergency_lock_board");
        state.log_queue.commit();

        state.set_board_emergency(Override::None, 300);
        state.reevaluate_schedules(300);
        assert!(state.door_relay_on(DoorId::Two));
    }

    /// Spec §8 scenario 6: the log queue enforces at-least-once delivery
    /// semantics (insertion order preserved, drop-oldest at capacity).
    #[test]
    fn log_queue_preserves_fifo_order_under_link_loss() {
        let mut state = fresh_state();
        for i in 0..5u32 {
            state.attempt(DoorId::One, Presented::Pin(format!("000{i}")), i as u64);
        }
        assert_eq!(state.log_queue.len(), 5);
        for i in 0..5u32 {
            assert_eq!(state.log_queue.peek().unwrap().credential, format!("000{i}"));
            state.log_queue.commit();
        }
        assert!(state.log_queue.is_empty());
    }

    #[test]
    fn wiegand_frame_completes_through_edge_capture_and_grants() {
        let mut state = fresh_state();
        state.users.push(User {
            name: "Alice".to_string(),
            active: true,
            cards: vec![CardCredential::Full { facility: 30, card: 33993 }],
            pins: vec![],
            doors: vec![DoorId::One],
        });
        let data: u32 = (30u32 << 16) | 33993;
        let mut bits = vec![1u8];
        for i in (0..24).rev() {
            bits.push(((data >> i) & 1) as u8);
        }
        bits.push(1);
        let mut at = Duration::from_millis(0);
        for bit in bits {
            let edge = if bit == 0 { Edge::D0 } else { Edge::D1 };
            state.on_edge(DoorId::One, edge, at);
            at += Duration::from_millis(1);
        }
        state.poll_frame_timeouts(200);
        assert!(state.door_relay_on(DoorId::One));
    }

    /// Each door's frame timeout is tracked against that door's own last
    /// edge, not a single timer shared across doors: a poll that's overdue
    /// for door 1 must not also cut door 2's still-within-window frame
    /// short, and vice versa once door 2 genuinely goes idle.
    #[test]
    fn frame_timeout_is_tracked_independently_per_door() {
        let mut state = fresh_state();
        state.on_edge(DoorId::One, Edge::D1, Duration::from_millis(0));
        for (i, bit) in [1u8, 0, 1, 0, 1].into_iter().enumerate() {
            let edge = if bit == 0 { Edge::D0 } else { Edge::D1 };
            state.on_edge(DoorId::Two, edge, Duration::from_millis(90 + i as u64));
        }

        // Door 1's last edge was 150ms ago (> BIT_TIMEOUT): its single
        // stray bit finalizes into an UnknownBitCount discard. Door 2's
        // last edge was only 56ms ago, still inside the inter-bit window,
        // so its 5-bit frame must not finalize yet.
        state.poll_frame_timeouts(150);
        assert_eq!(state.log_queue.len(), 1, "only door 1's overdue frame finalized");

        // Now door 2 has genuinely gone idle too.
        state.poll_frame_timeouts(250);
        assert_eq!(state.log_queue.len(), 2, "door 2's frame finalizes once it is actually idle");
    }

    #[test]
    fn keypad_pin_submit_through_engine_grants_temp_code() {
        let mut state = fresh_state();
        state.temp_codes.push(TempCode {
            code: "4321".to_string(),
            name: None,
            doors: vec![DoorId::One],
            policy: UsagePolicy::Unlimited,
            active: true,
            current_uses: 0,
        });
        for d in [4, 3, 2, 1] {
            state.on_keypad_key(DoorId::One, KeyPress::Digit(d), 0);
        }
        state.on_keypad_key(DoorId::One, KeyPress::Hash, 0);
        assert!(state.door_relay_on(DoorId::One));
    }
}
