//! Crate-wide error and access-log reason taxonomy.
//!
//! The teacher's `conway::parse_conway_response` returns bare `&'static str`
//! errors and logs-and-ignores at the call site; we keep that shape but give
//! it real types so the reason strings attached to denials and log entries
//! (spec §7) are produced in exactly one place instead of scattered format
//! strings.

use std::fmt;

/// Errors that can terminate a single fallible operation (never the loop).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("snapshot payload did not match the expected schema: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("network operation attempted while link is down")]
    LinkDown,

    #[error("controller unreachable: {0}")]
    ControllerUnreachable(String),
}

impl CoreError {
    /// The `reason` code from spec §7's error-kind table.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ParseError(_) => "parse_error",
            CoreError::LinkDown => "link_down",
            CoreError::ControllerUnreachable(_) => "controller_unreachable",
        }
    }
}

/// The outcome of a single access decision, and the reason attached to it.
///
/// Doubles as the human-readable text used in access-log entries (spec §3,
/// §8 scenarios) and as the snake_case `code()` used for the error-kind
/// table in spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Granted,
    EmergencyLockDoor,
    EmergencyLockBoard,
    EmergencyUnlockDoor,
    EmergencyUnlockBoard,
    ScheduleLocked,
    ScheduleUnlock,
    NoDoorAccess,
    OutsideSchedule,
    TempCodeDisabled,
    TempCodeExhaustedDoor,
    TempCodeNoDoorAccess,
    UnknownCredential,
    Rex,
    /// A Wiegand frame with a bit count matching no known format (spec
    /// §4.1: logged and discarded, never silently dropped).
    FrameUnknownBitcount,
    /// A `#` arrived too short or for a door other than the one that owns
    /// the shared PIN buffer (spec §4.2).
    PinTooShort,
}

impl Reason {
    /// snake_case error kind, per spec §7.
    pub fn code(&self) -> &'static str {
        match self {
            Reason::Granted => "granted",
            Reason::EmergencyLockDoor => "emergency_lock_door",
            Reason::EmergencyLockBoard => "emergency_lock_board",
            Reason::EmergencyUnlockDoor => "emergency_unlock_door",
            Reason::EmergencyUnlockBoard => "emergency_unlock_board",
            Reason::ScheduleLocked => "schedule_locked",
            Reason::ScheduleUnlock => "schedule_unlock",
            Reason::NoDoorAccess => "no_door_access",
            Reason::OutsideSchedule => "outside_schedule",
            Reason::TempCodeDisabled => "temp_code_disabled",
            Reason::TempCodeExhaustedDoor => "temp_code_exhausted_door",
            Reason::TempCodeNoDoorAccess => "temp_code_no_door_access",
            Reason::UnknownCredential => "unknown_credential",
            Reason::Rex => "rex",
            Reason::FrameUnknownBitcount => "frame_unknown_bitcount",
            Reason::PinTooShort => "pin_too_short_or_wrong_door",
        }
    }

    /// Human-readable text, matching the literal wording of spec §4.4/§8.
    pub fn text(&self) -> &'static str {
        match self {
            Reason::Granted => "Access granted",
            Reason::EmergencyLockDoor => "Emergency lockdown (door)",
            Reason::EmergencyLockBoard => "Emergency lockdown (board)",
            Reason::EmergencyUnlockDoor => "Emergency override (door)",
            Reason::EmergencyUnlockBoard => "Emergency evacuation (board)",
            Reason::ScheduleLocked => "Door locked by schedule",
            Reason::ScheduleUnlock => "Door unlocked by schedule",
            Reason::NoDoorAccess => "No access to this door",
            Reason::OutsideSchedule => "Outside allowed schedule",
            Reason::TempCodeDisabled => "Temp code disabled",
            Reason::TempCodeExhaustedDoor => "Temp code already used on this door (one-time)",
            Reason::TempCodeNoDoorAccess => "Temp code not valid for this door",
            Reason::UnknownCredential => "Unknown credential",
            Reason::Rex => "Request to exit",
            Reason::FrameUnknownBitcount => "Discarded frame with unrecognized bit count",
            Reason::PinTooShort => "PIN entry too short or submitted at the wrong door",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
