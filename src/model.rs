//! Snapshot data model: the shape of the configuration the controller pushes
//! down on sync (spec §3, §4.4). Replaces the teacher's hand-rolled
//! `parse_fob_list` integer-array parser (`conway.rs`) with serde-derived
//! schema structs, matching the JSON snapshot payload in spec §6.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies one of the two controlled doors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorId {
    One,
    Two,
}

impl DoorId {
    pub const ALL: [DoorId; 2] = [DoorId::One, DoorId::Two];

    /// Converts from the wire/admin-API door number (spec §6: `1|2`).
    pub fn from_number(n: u8) -> Option<DoorId> {
        match n {
            1 => Some(DoorId::One),
            2 => Some(DoorId::Two),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            DoorId::One => 1,
            DoorId::Two => 2,
        }
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorId::One => f.write_str("door_1"),
            DoorId::Two => f.write_str("door_2"),
        }
    }
}

/// Serializes/deserializes as `"1"`/`"2"`, matching the literal wire
/// contract (`door_number`, the `door_names`/`unlock_durations`/
/// `door_schedules` map keys of spec §6) rather than a derived variant
/// name.
impl Serialize for DoorId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(match self {
            DoorId::One => "1",
            DoorId::Two => "2",
        })
    }
}

impl<'de> Deserialize<'de> for DoorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u8>()
            .ok()
            .and_then(DoorId::from_number)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown door id {raw:?}")))
    }
}

/// The three states a door's relay logic can be driven into by the override
/// lattice or schedule evaluator (spec §4.4, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Unlock,
    Controlled,
    Locked,
}

/// Board- or door-level emergency override tri-state (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Override {
    None,
    Lock,
    Unlock,
}

/// A stored card credential. Distinguishes a full facility+card number from
/// a bare card-number-only credential, so `identity::card_matches` can
/// implement the leading-zero and bare-code tolerance spec §3 requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardCredential {
    Full { facility: u32, card: u32 },
    Bare { card: u32 },
}

impl Serialize for CardCredential {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            CardCredential::Full { facility, card } => {
                serializer.serialize_str(&format!("{facility}:{card}"))
            }
            CardCredential::Bare { card } => serializer.serialize_str(&card.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for CardCredential {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        CardCredential::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl CardCredential {
    /// Parses `"facility:card"` or a bare `"card"` string from the snapshot
    /// payload. Leading zeros in either part are tolerated (spec §3).
    pub fn parse(raw: &str) -> Result<CardCredential, String> {
        match raw.split_once(':') {
            Some((facility, card)) => {
                let facility: u32 = facility
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid facility code in {raw:?}"))?;
                let card: u32 = card
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid card number in {raw:?}"))?;
                Ok(CardCredential::Full { facility, card })
            }
            None => {
                let card: u32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid card number in {raw:?}"))?;
                Ok(CardCredential::Bare { card })
            }
        }
    }
}

/// A user/principal record as pushed by the controller sync payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub cards: Vec<CardCredential>,
    #[serde(default)]
    pub pins: Vec<String>,
    pub doors: Vec<DoorId>,
}

/// Usage policy attached to a temp code (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "max_uses")]
pub enum UsagePolicy {
    OneTime,
    Limited(u32),
    Unlimited,
}

/// A temporary PIN code, scoped to one or more doors (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempCode {
    pub code: String,
    /// Display name, rendered as the "🎫 <name>" principal on a grant
    /// (spec §3, §4.4). Falls back to the code itself if the controller
    /// never assigned a friendlier label.
    #[serde(default)]
    pub name: Option<String>,
    pub doors: Vec<DoorId>,
    pub policy: UsagePolicy,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Total used count as last reported by the controller (spec §4.6):
    /// `current_uses == 0 && active` on a sync triggers a local ledger
    /// reset for this code.
    #[serde(default)]
    pub current_uses: u32,
}

impl TempCode {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code)
    }
}

fn default_true() -> bool {
    true
}

/// A single `(day_of_week, start, end)` window, used by both door schedules
/// and per-user schedules (spec §3). `day_of_week` is 0 = Monday.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduleInterval {
    pub day_of_week: u8,
    pub start_minute: u16,
    pub end_minute: u16,
    #[serde(default)]
    pub priority: i32,
}

impl ScheduleInterval {
    pub fn contains(&self, day_of_week: u8, minute_of_day: u16) -> bool {
        day_of_week == self.day_of_week
            && minute_of_day >= self.start_minute
            && minute_of_day < self.end_minute
    }
}

/// A door schedule entry: an interval paired with the mode it drives the
/// door into while active (spec §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DoorScheduleEntry {
    pub interval: ScheduleInterval,
    pub mode: ScheduleMode,
}

/// Static per-door configuration pushed down on sync (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorConfig {
    pub name: String,
    #[serde(default = "default_momentary_ms")]
    pub momentary_unlock_ms: u64,
}

fn default_momentary_ms() -> u64 {
    5_000
}

/// The full configuration snapshot ingested from a controller sync (spec
/// §4.4, §6). Replaces a category atomically on successful parse; a
/// malformed payload is rejected wholesale rather than partially applied.
///
/// `users`/`temp_codes`/`door_schedules`/`user_schedules` are `Option` so a
/// category's *presence* can be told apart from it being present-but-empty:
/// spec §6 says each present category replaces its in-memory state, so
/// `{"users": []}` must clear the user roster rather than no-op just
/// because the array happens to be empty (a plain `Vec`/`HashMap` with
/// `#[serde(default)]` can't distinguish "absent" from "empty array").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Option<Vec<User>>,
    #[serde(default)]
    pub temp_codes: Option<Vec<TempCode>>,
    #[serde(default)]
    pub door_schedules: Option<HashMap<DoorId, Vec<DoorScheduleEntry>>>,
    #[serde(default)]
    pub user_schedules: Option<HashMap<String, Vec<ScheduleInterval>>>,
    #[serde(default)]
    pub doors: HashMap<DoorId, DoorConfig>,
}

/// One entry in the bounded access-log FIFO (spec §3, §4.7, §6).
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    /// "YYYY-MM-DD HH:MM:SS" local time if wall-clock is set, else the
    /// decimal monotonic ms rendered as a string (spec §3, §6).
    pub timestamp: String,
    pub door: DoorId,
    /// The sentinel-aware identified principal: a user's name, "Unknown",
    /// "N/A (Emergency ...)", or "🎫 <code name>" (spec §3).
    pub principal: String,
    /// The raw credential string as presented (card "F N", PIN digits, or
    /// "REX" for a request-to-exit).
    pub credential: String,
    pub credential_type: CredentialType,
    pub granted: bool,
    pub reason: String,
    pub reason_code: String,
    pub monotonic_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    Card,
    Pin,
    TempCode,
    Manual,
}
