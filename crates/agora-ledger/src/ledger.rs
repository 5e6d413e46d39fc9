//! The trade ledger: an append-only log of every cash and asset movement.
//!
//! Amounts arrive from the market as `f64` and are stored as [`Decimal`]
//! so that per-round sums are exact. The ledger is cleared when a new
//! episode begins.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::debug;

use agora_types::AgentId;

use crate::conservation::{ConservationResult, verify_conservation};
use crate::{Account, Commodity, EntryKind, LedgerEntry, LedgerError};

/// Append-only record of every trade in the current episode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// All entries, in insertion order.
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create a new empty ledger.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return the number of entries in the ledger.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the ledger has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, for a new episode.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Validate and append one entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] for non-positive quantities or an entry whose
    /// two sides are the same account.
    pub fn record(&mut self, entry: LedgerEntry) -> Result<&LedgerEntry, LedgerError> {
        validate(&entry)?;
        self.entries.push(entry);
        self.entries.last().ok_or(LedgerError::InternalError(
            "failed to retrieve entry after append",
        ))
    }

    /// Record a buy: cash from the agent to the market, one asset back.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the price cannot be recorded. Nothing is
    /// appended in that case.
    pub fn record_buy(&mut self, round: u64, agent: AgentId, price: f64) -> Result<(), LedgerError> {
        let cash = to_decimal(price)?;
        let legs = vec![
            LedgerEntry {
                round,
                kind: EntryKind::Purchase,
                commodity: Commodity::Cash,
                from: Account::Agent(agent),
                to: Account::Market,
                quantity: cash,
            },
            LedgerEntry {
                round,
                kind: EntryKind::Purchase,
                commodity: Commodity::Asset,
                from: Account::Market,
                to: Account::Agent(agent),
                quantity: Decimal::ONE,
            },
        ];
        self.record_all(legs)?;
        debug!(round, agent = %agent, %cash, "ledger: buy recorded");
        Ok(())
    }

    /// Record a sell: one asset to the market, the gross price back, and
    /// the tax from the agent to the treasury.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if an amount cannot be recorded. Nothing is
    /// appended in that case.
    pub fn record_sell(
        &mut self,
        round: u64,
        agent: AgentId,
        gross: f64,
        tax: f64,
    ) -> Result<(), LedgerError> {
        let gross_cash = to_decimal(gross)?;
        let tax_cash = to_decimal(tax)?;
        let mut legs = vec![
            LedgerEntry {
                round,
                kind: EntryKind::Sale,
                commodity: Commodity::Asset,
                from: Account::Agent(agent),
                to: Account::Market,
                quantity: Decimal::ONE,
            },
            LedgerEntry {
                round,
                kind: EntryKind::Sale,
                commodity: Commodity::Cash,
                from: Account::Market,
                to: Account::Agent(agent),
                quantity: gross_cash,
            },
        ];
        if tax_cash > Decimal::ZERO {
            legs.push(LedgerEntry {
                round,
                kind: EntryKind::Tax,
                commodity: Commodity::Cash,
                from: Account::Agent(agent),
                to: Account::Treasury,
                quantity: tax_cash,
            });
        }
        self.record_all(legs)?;
        debug!(round, agent = %agent, gross = %gross_cash, tax = %tax_cash, "ledger: sell recorded");
        Ok(())
    }

    /// Validate every leg before appending any of them.
    fn record_all(&mut self, legs: Vec<LedgerEntry>) -> Result<(), LedgerError> {
        legs.iter().try_for_each(validate)?;
        self.entries.extend(legs);
        Ok(())
    }

    /// Verify the conservation law for a given round.
    pub fn verify_conservation(&self, round: u64) -> ConservationResult {
        verify_conservation(round, &self.entries)
    }

    /// Return all entries for a given round.
    pub fn entries_for_round(&self, round: u64) -> Vec<&LedgerEntry> {
        self.entries.iter().filter(|e| e.round == round).collect()
    }

    /// Return all entries, in insertion order.
    pub fn all_entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Net amount of `commodity` received by `account` in `round`.
    ///
    /// Positive means the account received more than it sent.
    pub fn net_flow(&self, account: Account, commodity: Commodity, round: u64) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.round == round && e.commodity == commodity)
            .fold(Decimal::ZERO, |balance, entry| {
                let credited = if entry.to == account {
                    balance.saturating_add(entry.quantity)
                } else {
                    balance
                };
                if entry.from == account {
                    credited.saturating_sub(entry.quantity)
                } else {
                    credited
                }
            })
    }

    /// Net cash and asset flow for every agent that traded in `round`.
    pub fn agent_flows(&self, round: u64) -> BTreeMap<AgentId, (f64, f64)> {
        let agents: BTreeSet<AgentId> = self
            .entries
            .iter()
            .filter(|e| e.round == round)
            .flat_map(|e| [e.from, e.to])
            .filter_map(|account| match account {
                Account::Agent(id) => Some(id),
                Account::Market | Account::Treasury => None,
            })
            .collect();
        agents
            .into_iter()
            .map(|id| {
                let account = Account::Agent(id);
                let cash = self
                    .net_flow(account, Commodity::Cash, round)
                    .to_f64()
                    .unwrap_or(f64::NAN);
                let assets = self
                    .net_flow(account, Commodity::Asset, round)
                    .to_f64()
                    .unwrap_or(f64::NAN);
                (id, (cash, assets))
            })
            .collect()
    }
}

/// Reject entries that do not move a positive amount between two accounts.
fn validate(entry: &LedgerEntry) -> Result<(), LedgerError> {
    if entry.quantity <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveQuantity {
            quantity: entry.quantity,
        });
    }
    if entry.from == entry.to {
        return Err(LedgerError::SelfTransfer(entry.from));
    }
    Ok(())
}

/// Convert a market amount to a [`Decimal`].
fn to_decimal(amount: f64) -> Result<Decimal, LedgerError> {
    Decimal::from_f64(amount).ok_or_else(|| LedgerError::Unrepresentable(amount.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
