//! Credential normalization and matching (spec §3, §4.2).
//!
//! Grounded in the teacher's `wiegand::WiegandRead::to_fob` (`facility *
//! 100_000 + card`), which the spec explicitly rejects in favor of matching
//! facility and card number independently so a presented card can match a
//! stored bare-code credential, and so leading zeros on either half never
//! change identity.

use crate::model::CardCredential;

/// A credential as decoded off the wire, before any lookup against stored
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedCard {
    pub facility: u32,
    pub card: u32,
}

/// True if a presented card matches a stored credential.
///
/// A `Full` stored credential requires both halves to match. A `Bare`
/// stored credential matches on the card number alone, regardless of which
/// facility code the presented card carries — this is the "equivalence"
/// spec §3 calls out explicitly.
pub fn card_matches(stored: &CardCredential, presented: PresentedCard) -> bool {
    match stored {
        CardCredential::Full { facility, card } => {
            *facility == presented.facility && *card == presented.card
        }
        CardCredential::Bare { card } => *card == presented.card,
    }
}

/// True if a presented PIN string matches a stored PIN or temp code.
/// Exact digit-string equality; no normalization applies to PINs (spec §4.2
/// notes PINs are always 4-8 raw decimal digits with no leading-zero
/// ambiguity since the string itself, not a parsed integer, is compared).
pub fn pin_matches(stored: &str, presented: &str) -> bool {
    stored == presented
}
