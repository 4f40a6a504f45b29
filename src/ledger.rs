//! Temp-code usage ledger (spec §4.6).
//!
//! The teacher tracks fob validity with a seqlock-guarded `[AtomicU32;
//! MAX_FOBS]` (`shared.rs`) because `check_fob` runs on Core 0 while
//! `update_fobs` runs on Core 1 concurrently. Under the single-task
//! cooperative loop (spec §9) there is exactly one owner of this state at
//! any instant, so the seqlock collapses to a plain `HashMap` — same
//! responsibility (per-key usage counting, reset on resync), no
//! synchronization needed.

use crate::model::{DoorId, UsagePolicy};
use std::collections::HashMap;

/// Per-(code, door) usage counts for temp codes. Volatile: a controller
/// restart loses counts, same as the teacher's RAM-only fob table.
#[derive(Debug, Default)]
pub struct UsageLedger {
    counts: HashMap<(String, DoorId), u32>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uses(&self, code: &str, door: DoorId) -> u32 {
        self.counts
            .get(&(code.to_string(), door))
            .copied()
            .unwrap_or(0)
    }

    /// True if `policy` still permits one more use on `door` given the uses
    /// recorded so far.
    pub fn may_use(&self, code: &str, door: DoorId, policy: UsagePolicy) -> bool {
        match policy {
            UsagePolicy::Unlimited => true,
            UsagePolicy::OneTime => self.uses(code, door) == 0,
            UsagePolicy::Limited(max) => self.uses(code, door) < max,
        }
    }

    /// Records one use of `code` on `door`. Call only after `may_use`
    /// confirmed the grant, to keep the count an accurate record of actual
    /// unlocks rather than attempts.
    pub fn record_use(&mut self, code: &str, door: DoorId) {
        *self.counts.entry((code.to_string(), door)).or_insert(0) += 1;
    }

    /// Clears usage for `code` on every door. Called when a controller sync
    /// reports `current_uses == 0` for a still-active code, reconciling our
    /// local count back to the authoritative server-side value (spec §4.6).
    pub fn reset(&mut self, code: &str) {
        self.counts.retain(|(c, _), _| c != code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_time_allows_exactly_one_use_per_door() {
        let mut ledger = UsageLedger::new();
        assert!(ledger.may_use("1234", DoorId::One, UsagePolicy::OneTime));
        ledger.record_use("1234", DoorId::One);
        assert!(!ledger.may_use("1234", DoorId::One, UsagePolicy::OneTime));
    }

    #[test]
    fn one_time_is_independent_per_door() {
        let mut ledger = UsageLedger::new();
        ledger.record_use("1234", DoorId::One);
        assert!(ledger.may_use("1234", DoorId::Two, UsagePolicy::OneTime));
    }

    #[test]
    fn limited_allows_up_to_max() {
        let mut ledger = UsageLedger::new();
        let policy = UsagePolicy::Limited(3);
        for _ in 0..3 {
            assert!(ledger.may_use("9999", DoorId::One, policy));
            ledger.record_use("9999", DoorId::One);
        }
        assert!(!ledger.may_use("9999", DoorId::One, policy));
    }

    #[test]
    fn unlimited_never_exhausts() {
        let mut ledger = UsageLedger::new();
        for _ in 0..50 {
            ledger.record_use("0000", DoorId::One);
        }
        assert!(ledger.may_use("0000", DoorId::One, UsagePolicy::Unlimited));
    }

    #[test]
    fn reset_clears_all_doors_for_a_code() {
        let mut ledger = UsageLedger::new();
        ledger.record_use("1234", DoorId::One);
        ledger.record_use("1234", DoorId::Two);
        ledger.reset("1234");
        assert_eq!(ledger.uses("1234", DoorId::One), 0);
        assert_eq!(ledger.uses("1234", DoorId::Two), 0);
    }
}
