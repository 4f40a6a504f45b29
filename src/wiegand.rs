//! Wiegand frame assembly and keypad PIN assembly (spec §4.1).
//!
//! Grounded on the teacher's `Wiegand::read`/`decode_26`/`decode_34`: same
//! bit-shift accumulation and debounce strategy, restructured as a pure
//! sans-IO state machine so it can be driven by plain `(edge, timestamp)`
//! pairs instead of directly polling `embassy_hal::gpio::Input` — the
//! hosted edge-capture task (spec §4.1, §9) owns the GPIO/interrupt
//! concerns and just feeds `FrameAssembler::on_edge`.
//!
//! Deviates from the teacher on one point by design: `decode_26` here does
//! **not** validate the parity bits the teacher checks. The reference
//! system this project mirrors accepts the 26 data bits unconditionally,
//! so a reader that drops or mangles a parity bit never silently denies an
//! otherwise-valid card.

use std::time::Duration;

pub const DEBOUNCE: Duration = Duration::from_micros(500);
/// Inter-bit timeout after which an in-progress frame is considered
/// complete (spec §4.1: `INTER_BIT_TIMEOUT_MS`, 100 ms).
pub const BIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Which Wiegand line transitioned; `D0` encodes bit `0`, `D1` bit `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    D0,
    D1,
}

/// A fully assembled frame, or the reason one couldn't be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Card { facility: u32, card: u32 },
    Key(KeyPress),
    /// Bit count didn't match any known format (spec §4.1: log and
    /// discard).
    UnknownBitCount(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Digit(u8),
    Star,
    Hash,
}

/// Accumulates Wiegand bit edges into a frame. One instance per door.
pub struct FrameAssembler {
    bits: u64,
    count: u32,
    last_bit_at: Option<Duration>,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            bits: 0,
            count: 0,
            last_bit_at: None,
        }
    }

    /// Feeds one edge at monotonic timestamp `at`. Edges arriving within
    /// `DEBOUNCE` of the previous one are ignored, matching the teacher's
    /// optocoupler-ringing workaround.
    pub fn on_edge(&mut self, edge: Edge, at: Duration) {
        if let Some(last) = self.last_bit_at {
            if at.saturating_sub(last) < DEBOUNCE {
                return;
            }
        }
        self.last_bit_at = Some(at);
        if self.count >= 64 {
            return;
        }
        let bit = match edge {
            Edge::D0 => 0,
            Edge::D1 => 1,
        };
        self.bits = (self.bits << 1) | bit;
        self.count += 1;
    }

    /// Call once `BIT_TIMEOUT` has elapsed with no further edges. Returns
    /// `None` if nothing was accumulated (no transmission in progress).
    /// Resets internal state either way.
    pub fn finalize(&mut self) -> Option<Frame> {
        if self.count == 0 {
            return None;
        }
        let bits = self.bits;
        let count = self.count;
        self.bits = 0;
        self.count = 0;
        self.last_bit_at = None;
        Some(decode(bits, count))
    }

    /// Call on every scheduler tick with the current monotonic time.
    /// Finalizes this door's frame iff more than `BIT_TIMEOUT` has elapsed
    /// since its last edge — unlike `finalize`, the assembler tracks its
    /// own last-edge time rather than trusting the caller to know it, so
    /// polling an idle door between edges is a no-op (spec §4.1).
    pub fn poll(&mut self, now: Duration) -> Option<Frame> {
        let last = self.last_bit_at?;
        if now.saturating_sub(last) > BIT_TIMEOUT {
            self.finalize()
        } else {
            None
        }
    }
}

fn decode(bits: u64, count: u32) -> Frame {
    match count {
        26 => decode_26(bits as u32),
        4 => decode_key((bits & 0xF) as u8),
        8 => decode_key((bits & 0xF) as u8),
        other => Frame::UnknownBitCount(other),
    }
}

fn decode_26(raw: u32) -> Frame {
    let data = (raw >> 1) & 0xFF_FFFF;
    let facility = (data >> 16) & 0xFF;
    let card = data & 0xFFFF;
    Frame::Card { facility, card }
}

fn decode_key(code: u8) -> Frame {
    let key = match code {
        0..=9 => KeyPress::Digit(code),
        10 => KeyPress::Star,
        11 => KeyPress::Hash,
        _ => return Frame::UnknownBitCount(4),
    };
    Frame::Key(key)
}

/// Minimum/maximum PIN length the assembler will submit (spec §4.1, §4.2).
pub const PIN_MIN_LEN: usize = 4;
pub const PIN_MAX_LEN: usize = 8;

/// Idle timeout after the last digit before the buffer is discarded (spec
/// §4.2). The scheduler loop SHOULD poll `check_idle` no more often than
/// every 5s to bound wakeups; the assembler itself doesn't care how often
/// it's polled, only how much time has elapsed.
pub const PIN_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of feeding a keypad event into the PIN assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// Still accumulating digits.
    Pending,
    /// `#` terminated a PIN of acceptable length on the door that owns the
    /// buffer; ready to submit as a credential attempt at that door.
    Submit { door: u8, pin: String },
    /// `#` arrived with too few digits, or for a door other than the one
    /// that owns the current buffer (spec §4.2: "too short / wrong door").
    TooShortOrWrongDoor,
    /// `*` discarded whatever had been entered so far.
    Cancelled,
    /// The idle timeout elapsed with no further digits; buffer discarded.
    TimedOut,
}

/// A single shared PIN buffer with one active door at a time (spec §4.2).
///
/// Unlike the Wiegand `FrameAssembler` (one instance per door, since card
/// reads at two doors are independent electrical events), the PIN buffer is
/// explicitly shared: a digit typed at door 2 while a partial PIN is
/// pending for door 1 clears door 1's partial entry rather than
/// interleaving with it, because there is exactly one shared keypad buffer
/// in the reference hardware this mirrors, not one per door.
#[derive(Default)]
pub struct PinAssembler {
    buf: String,
    current_door: Option<u8>,
    last_digit_at: Option<Duration>,
}

impl PinAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a digit key event for `door` at monotonic time `now`.
    pub fn on_digit(&mut self, door: u8, digit: u8, now: Duration) -> PinOutcome {
        if self.current_door != Some(door) {
            self.buf.clear();
            self.current_door = Some(door);
        }
        self.last_digit_at = Some(now);
        self.buf.push((b'0' + digit) as char);
        if self.buf.len() > PIN_MAX_LEN {
            self.buf.clear();
            self.current_door = None;
            self.last_digit_at = None;
            return PinOutcome::Cancelled;
        }
        PinOutcome::Pending
    }

    /// Feeds a `#` (submit) event for `door`.
    pub fn on_submit(&mut self, door: u8) -> PinOutcome {
        let outcome = if self.buf.len() >= PIN_MIN_LEN && self.current_door == Some(door) {
            PinOutcome::Submit {
                door,
                pin: std::mem::take(&mut self.buf),
            }
        } else {
            PinOutcome::TooShortOrWrongDoor
        };
        self.buf.clear();
        self.current_door = None;
        self.last_digit_at = None;
        outcome
    }

    /// Feeds a `*` (clear) event; discards whatever buffer/door state was
    /// pending regardless of which door it arrived from.
    pub fn on_clear(&mut self) -> PinOutcome {
        self.buf.clear();
        self.current_door = None;
        self.last_digit_at = None;
        PinOutcome::Cancelled
    }

    /// Call periodically (spec §4.2 suggests no more often than every 5s).
    /// Discards the buffer if more than `PIN_IDLE_TIMEOUT` has elapsed
    /// since the last digit. Returns `true` if it did.
    pub fn check_idle(&mut self, now: Duration) -> bool {
        match self.last_digit_at {
            Some(last) if now.saturating_sub(last) > PIN_IDLE_TIMEOUT => {
                self.buf.clear();
                self.current_door = None;
                self.last_digit_at = None;
                true
            }
            _ => false,
        }
    }
}
