//! Conservation verification for the trade ledger.
//!
//! Two checks run for each round:
//!
//! ```text
//! sum(debits for C in R) == sum(credits for C in R)      for every commodity C
//! cash_legs(K in R) == asset_legs(K in R)                for K in {Purchase, Sale}
//! ```
//!
//! The first holds by construction for well-formed entries. The second
//! catches a trade recorded with only one of its legs. Tax entries move
//! cash only and are exempt from pairing.
//!
//! A violation produces a [`LedgerAnomaly`].

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use crate::{Commodity, EntryKind, LedgerAnomaly, LedgerEntry};

/// The result of a conservation check for a single round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// The ledger is balanced for this round.
    Balanced,
    /// One or more commodities or trades do not balance.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Whether the round balanced.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify the conservation law for all entries in a single round.
pub fn verify_conservation(round: u64, entries: &[LedgerEntry]) -> ConservationResult {
    let mut debits: BTreeMap<Commodity, Decimal> = BTreeMap::new();
    let mut credits: BTreeMap<Commodity, Decimal> = BTreeMap::new();
    let mut legs: BTreeMap<EntryKind, (u64, u64)> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.round == round) {
        let d = debits.entry(entry.commodity).or_insert(Decimal::ZERO);
        *d = match d.checked_add(entry.quantity) {
            Some(val) => val,
            None => return overflow_anomaly(round, entry.commodity),
        };
        let c = credits.entry(entry.commodity).or_insert(Decimal::ZERO);
        *c = match c.checked_add(entry.quantity) {
            Some(val) => val,
            None => return overflow_anomaly(round, entry.commodity),
        };

        if entry.kind != EntryKind::Tax {
            let (cash, asset) = legs.entry(entry.kind).or_insert((0, 0));
            match entry.commodity {
                Commodity::Cash => *cash = cash.saturating_add(1),
                Commodity::Asset => *asset = asset.saturating_add(1),
            }
        }
    }

    let commodities: BTreeSet<Commodity> =
        debits.keys().chain(credits.keys()).copied().collect();
    let imbalances: BTreeMap<Commodity, (Decimal, Decimal)> = commodities
        .into_iter()
        .filter_map(|commodity| {
            let debit = debits.get(&commodity).copied().unwrap_or(Decimal::ZERO);
            let credit = credits.get(&commodity).copied().unwrap_or(Decimal::ZERO);
            (debit != credit).then_some((commodity, (debit, credit)))
        })
        .collect();
    let unpaired: BTreeMap<EntryKind, (u64, u64)> = legs
        .into_iter()
        .filter(|(_, (cash, asset))| cash != asset)
        .collect();

    if imbalances.is_empty() && unpaired.is_empty() {
        ConservationResult::Balanced
    } else {
        let message = format!(
            "LEDGER_ANOMALY at round {round}: {} commodity imbalance(s), {} unpaired trade kind(s)",
            imbalances.len(),
            unpaired.len(),
        );
        ConservationResult::Anomaly(LedgerAnomaly {
            round,
            imbalances,
            unpaired,
            message,
        })
    }
}

/// Construct an anomaly result for arithmetic overflow during summation.
fn overflow_anomaly(round: u64, commodity: Commodity) -> ConservationResult {
    let mut imbalances = BTreeMap::new();
    imbalances.insert(commodity, (Decimal::ZERO, Decimal::ZERO));
    ConservationResult::Anomaly(LedgerAnomaly {
        round,
        imbalances,
        unpaired: BTreeMap::new(),
        message: format!(
            "LEDGER_ANOMALY at round {round}: arithmetic overflow while summing {commodity:?}",
        ),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
