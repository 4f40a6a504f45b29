//! The override-lattice decision engine (spec §4.4).
//!
//! Grounded on the teacher's `core0::run` credential-check branch (check
//! fob → grant/deny → pulse or request-sync), generalized from a single
//! `check_fob` lookup into the full layered resolution order the spec
//! requires: door emergency lock → door emergency unlock → board emergency
//! lock → board emergency unlock → door schedule locked → door schedule
//! unlock → normal resolution (user match → temp-code match → unknown).

use crate::identity::{card_matches, pin_matches, PresentedCard};
use crate::ledger::UsageLedger;
use crate::model::{CredentialType, DoorId, Override, ScheduleMode, TempCode, User};
use crate::schedule::{user_in_schedule, WallClock};
use crate::error::Reason;
use std::collections::HashMap;

/// A credential as read off the wire, ready for lookup.
#[derive(Debug, Clone)]
pub enum Presented {
    Card(PresentedCard),
    Pin(String),
    /// A request-to-exit pushbutton event (spec §4.5): carries no
    /// credential to match, only subject to the emergency-lock steps of
    /// the override lattice.
    Rex,
}

impl Presented {
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Presented::Card(_) => CredentialType::Card,
            Presented::Pin(_) => CredentialType::Pin,
            Presented::Rex => CredentialType::Manual,
        }
    }

    /// The raw string recorded in the access log (spec §3): "F N" for a
    /// card, the digit string for a PIN, "REX" for a request-to-exit.
    pub fn credential_string(&self) -> String {
        match self {
            Presented::Card(card) => format!("{} {}", card.facility, card.card),
            Presented::Pin(pin) => pin.clone(),
            Presented::Rex => "REX".to_string(),
        }
    }
}

/// Sentinel principal strings spec §3 calls out by name.
pub const PRINCIPAL_UNKNOWN: &str = "Unknown";
pub const PRINCIPAL_EMERGENCY_OVERRIDE: &str = "N/A (Emergency Override)";
pub const PRINCIPAL_EMERGENCY_EVACUATION: &str = "N/A (Emergency Evacuation)";
pub const PRINCIPAL_REX: &str = "REX";

/// The result of running a credential through the decision engine.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub granted: bool,
    pub reason: Reason,
    pub principal: String,
    pub credential_type: CredentialType,
    /// Set when a temp code was the matching credential, so the caller can
    /// record the usage and queue a usage report to the controller.
    pub temp_code_used: Option<String>,
}

impl Verdict {
    fn deny(reason: Reason, credential_type: CredentialType) -> Self {
        Verdict {
            granted: false,
            reason,
            principal: PRINCIPAL_UNKNOWN.to_string(),
            credential_type,
            temp_code_used: None,
        }
    }

    fn grant(reason: Reason, principal: impl Into<String>, credential_type: CredentialType) -> Self {
        Verdict {
            granted: true,
            reason,
            principal: principal.into(),
            credential_type,
            temp_code_used: None,
        }
    }
}

/// Read-only view of the per-door state the decision engine needs.
pub struct DoorView {
    pub emergency_override: Override,
    pub current_schedule_mode: ScheduleMode,
}

/// Resolves one presented credential against the current override lattice
/// and, if no override short-circuits it, the normal user/temp-code
/// matching rules (spec §4.4).
///
/// `ledger` is consulted (not mutated) here; callers record the use only
/// after accepting the granted verdict, so a verdict computed but discarded
/// (e.g. the caller errors before acting on it) never burns a one-time use.
#[allow(clippy::too_many_arguments)]
pub fn resolve(
    door: DoorId,
    door_view: &DoorView,
    board_emergency: Override,
    presented: &Presented,
    users: &[User],
    temp_codes: &[TempCode],
    user_schedules: &HashMap<String, Vec<crate::model::ScheduleInterval>>,
    ledger: &UsageLedger,
    now: Option<WallClock>,
) -> Verdict {
    let credential_type = presented.credential_type();

    if door_view.emergency_override == Override::Lock {
        return Verdict::deny(Reason::EmergencyLockDoor, credential_type);
    }
    if door_view.emergency_override == Override::Unlock {
        return Verdict::grant(Reason::EmergencyUnlockDoor, PRINCIPAL_EMERGENCY_OVERRIDE, credential_type);
    }
    if board_emergency == Override::Lock {
        return Verdict::deny(Reason::EmergencyLockBoard, credential_type);
    }
    if board_emergency == Override::Unlock {
        return Verdict::grant(Reason::EmergencyUnlockBoard, PRINCIPAL_EMERGENCY_EVACUATION, credential_type);
    }

    if matches!(presented, Presented::Rex) {
        // REX is a manual grant: subject to the emergency-lock steps above
        // (already cleared by this point) but never to the door/schedule
        // lattice below — a request-to-exit does not stop to check
        // against a user's permitted door set or time-of-day window (spec
        // §4.5, §9 Open Question, resolved here: REX bypasses schedule
        // gating but not lockdown).
        return Verdict::grant(Reason::Rex, PRINCIPAL_REX, credential_type);
    }

    if door_view.current_schedule_mode == ScheduleMode::Locked {
        return Verdict::deny(Reason::ScheduleLocked, credential_type);
    }
    if door_view.current_schedule_mode == ScheduleMode::Unlock {
        // Identification never blocks the grant (spec §4.4 step 6); best
        // effort only, for logging.
        let principal = find_user(presented, users)
            .filter(|u| u.active)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| PRINCIPAL_UNKNOWN.to_string());
        return Verdict::grant(Reason::ScheduleUnlock, principal, credential_type);
    }

    normal_resolution(door, presented, users, temp_codes, user_schedules, ledger, now)
}

fn normal_resolution(
    door: DoorId,
    presented: &Presented,
    users: &[User],
    temp_codes: &[TempCode],
    user_schedules: &HashMap<String, Vec<crate::model::ScheduleInterval>>,
    ledger: &UsageLedger,
    now: Option<WallClock>,
) -> Verdict {
    let credential_type = presented.credential_type();

    if let Some(user) = find_user(presented, users) {
        if !user.active {
            return Verdict::deny(Reason::UnknownCredential, credential_type);
        }
        if !user.doors.contains(&door) {
            let mut v = Verdict::deny(Reason::NoDoorAccess, credential_type);
            v.principal = user.name.clone();
            return v;
        }
        let intervals = user_schedules.get(&user.name).map(Vec::as_slice).unwrap_or(&[]);
        if !user_in_schedule(intervals, now) {
            let mut v = Verdict::deny(Reason::OutsideSchedule, credential_type);
            v.principal = user.name.clone();
            return v;
        }
        return Verdict::grant(Reason::Granted, user.name.clone(), credential_type);
    }

    if let Presented::Pin(pin) = presented {
        if let Some(temp) = temp_codes.iter().find(|t| pin_matches(&t.code, pin)) {
            let principal = format!("🎫 {}", temp.display_name());
            if !temp.active {
                let mut v = Verdict::deny(Reason::TempCodeDisabled, CredentialType::TempCode);
                v.principal = principal;
                return v;
            }
            if !ledger.may_use(&temp.code, door, temp.policy) {
                let mut v = Verdict::deny(Reason::TempCodeExhaustedDoor, CredentialType::TempCode);
                v.principal = principal;
                return v;
            }
            if !temp.doors.contains(&door) {
                let mut v = Verdict::deny(Reason::TempCodeNoDoorAccess, CredentialType::TempCode);
                v.principal = principal;
                return v;
            }
            let mut v = Verdict::grant(Reason::Granted, principal, CredentialType::TempCode);
            v.temp_code_used = Some(temp.code.clone());
            return v;
        }
    }

    Verdict::deny(Reason::UnknownCredential, credential_type)
}

/// First-match-wins lookup of the stored user a presented credential
/// resolves to. Inactive users still match (the caller denies
/// unconditionally on `!user.active`) rather than being skipped, since
/// spec §3 defines inactivity as a property of the matched principal, not
/// a reason to try the next candidate.
fn find_user<'a>(presented: &Presented, users: &'a [User]) -> Option<&'a User> {
    users.iter().find(|user| match presented {
        Presented::Card(card) => user.cards.iter().any(|c| card_matches(c, *card)),
        Presented::Pin(pin) => user.pins.iter().any(|stored| pin_matches(stored, pin)),
        Presented::Rex => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardCredential, UsagePolicy};

    fn view(emergency: Override, mode: ScheduleMode) -> DoorView {
        DoorView {
            emergency_override: emergency,
            current_schedule_mode: mode,
        }
    }

    fn user(name: &str, card: u32, doors: &[DoorId]) -> User {
        User {
            name: name.to_string(),
            active: true,
            cards: vec![CardCredential::Bare { card }],
            pins: vec![],
            doors: doors.to_vec(),
        }
    }

    #[test]
    fn door_lock_overrides_everything_including_valid_user() {
        let users = vec![user("alice", 111, &[DoorId::One])];
        let verdict = resolve(
            DoorId::One,
            &view(Override::Lock, ScheduleMode::Controlled),
            Override::None,
            &Presented::Card(PresentedCard {
                facility: 1,
                card: 111,
            }),
            &users,
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::EmergencyLockDoor);
    }

    #[test]
    fn board_lock_overrides_door_unlock_schedule() {
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Unlock),
            Override::Lock,
            &Presented::Pin("1234".into()),
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::EmergencyLockBoard);
    }

    #[test]
    fn schedule_locked_denies_even_valid_user() {
        let users = vec![user("alice", 111, &[DoorId::One])];
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Locked),
            Override::None,
            &Presented::Card(PresentedCard {
                facility: 1,
                card: 111,
            }),
            &users,
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::ScheduleLocked);
    }

    #[test]
    fn user_without_door_access_is_denied() {
        let users = vec![user("alice", 111, &[DoorId::Two])];
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Card(PresentedCard {
                facility: 1,
                card: 111,
            }),
            &users,
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::NoDoorAccess);
    }

    #[test]
    fn unknown_card_is_denied() {
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Card(PresentedCard {
                facility: 1,
                card: 999,
            }),
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::UnknownCredential);
    }

    #[test]
    fn temp_code_grant_reports_which_code_to_record() {
        let temp_codes = vec![TempCode {
            code: "4321".to_string(),
            name: None,
            doors: vec![DoorId::One],
            policy: UsagePolicy::OneTime,
            active: true,
            current_uses: 0,
        }];
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Pin("4321".into()),
            &[],
            &temp_codes,
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(verdict.granted);
        assert_eq!(verdict.temp_code_used.as_deref(), Some("4321"));
    }

    #[test]
    fn exhausted_temp_code_is_denied() {
        let temp_codes = vec![TempCode {
            code: "4321".to_string(),
            name: None,
            doors: vec![DoorId::One],
            policy: UsagePolicy::OneTime,
            active: true,
            current_uses: 0,
        }];
        let mut ledger = UsageLedger::new();
        ledger.record_use("4321", DoorId::One);
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Pin("4321".into()),
            &[],
            &temp_codes,
            &HashMap::new(),
            &ledger,
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::TempCodeExhaustedDoor);
    }

    #[test]
    fn user_schedule_denies_outside_window() {
        let users = vec![user("alice", 111, &[DoorId::One])];
        let mut schedules = HashMap::new();
        schedules.insert(
            "alice".to_string(),
            vec![crate::model::ScheduleInterval {
                day_of_week: 0,
                start_minute: 8 * 60,
                end_minute: 17 * 60,
                priority: 0,
            }],
        );
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Card(PresentedCard {
                facility: 1,
                card: 111,
            }),
            &users,
            &[],
            &schedules,
            &UsageLedger::new(),
            Some(WallClock {
                day_of_week: 0,
                minute_of_day: 20 * 60,
            }),
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::OutsideSchedule);
    }

    #[test]
    fn inactive_user_is_denied_as_unknown() {
        let mut alice = user("alice", 111, &[DoorId::One]);
        alice.active = false;
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Card(PresentedCard {
                facility: 1,
                card: 111,
            }),
            &[alice],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted);
        assert_eq!(verdict.reason, Reason::UnknownCredential);
    }

    #[test]
    fn rex_grants_under_normal_conditions() {
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Locked),
            Override::None,
            &Presented::Rex,
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(verdict.granted, "REX bypasses schedule-locked gating");
        assert_eq!(verdict.principal, PRINCIPAL_REX);
        assert_eq!(verdict.credential_type, CredentialType::Manual);
    }

    #[test]
    fn rex_is_denied_under_door_lockdown() {
        let verdict = resolve(
            DoorId::One,
            &view(Override::Lock, ScheduleMode::Controlled),
            Override::None,
            &Presented::Rex,
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted, "REX must not bypass a door lockdown");
        assert_eq!(verdict.reason, Reason::EmergencyLockDoor);
    }

    #[test]
    fn rex_is_denied_under_board_lockdown() {
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::Lock,
            &Presented::Rex,
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(!verdict.granted, "REX must not bypass a board lockdown");
        assert_eq!(verdict.reason, Reason::EmergencyLockBoard);
    }

    #[test]
    fn emergency_unlock_uses_sentinel_principals() {
        let door_unlock = resolve(
            DoorId::One,
            &view(Override::Unlock, ScheduleMode::Controlled),
            Override::None,
            &Presented::Pin("0000".into()),
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert_eq!(door_unlock.principal, PRINCIPAL_EMERGENCY_OVERRIDE);

        let board_unlock = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::Unlock,
            &Presented::Pin("0000".into()),
            &[],
            &[],
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert_eq!(board_unlock.principal, PRINCIPAL_EMERGENCY_EVACUATION);
    }

    #[test]
    fn temp_code_principal_uses_display_name_with_ticket_emoji() {
        let temp_codes = vec![TempCode {
            code: "9988".to_string(),
            name: Some("Guest".to_string()),
            doors: vec![DoorId::One],
            policy: UsagePolicy::Unlimited,
            active: true,
            current_uses: 0,
        }];
        let verdict = resolve(
            DoorId::One,
            &view(Override::None, ScheduleMode::Controlled),
            Override::None,
            &Presented::Pin("9988".into()),
            &[],
            &temp_codes,
            &HashMap::new(),
            &UsageLedger::new(),
            None,
        );
        assert!(verdict.granted);
        assert_eq!(verdict.principal, "🎫 Guest");
    }
}
