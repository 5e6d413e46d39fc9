//! Double-entry trade ledger for the Agora simulation.
//!
//! Every successful market trade is recorded as a set of entries that move
//! a commodity between two accounts. Cash and assets are never created or
//! destroyed by a trade: the market pays out what the agent receives, and
//! sale tax moves from the seller to the treasury.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`Ledger`] struct: append-only log with recording methods.
//! - [`conservation`] -- Per-round balance verification and anomaly detection.
//!
//! # Entries per trade
//!
//! | Trade | Commodity | From | To | Quantity |
//! |-------|-----------|------|----|----------|
//! | Buy | Cash | Agent | Market | execution price |
//! | Buy | Asset | Market | Agent | 1 |
//! | Sell | Cash | Market | Agent | gross price |
//! | Sell | Asset | Agent | Market | 1 |
//! | Sell | Cash | Agent | Treasury | tax (omitted when zero) |
//!
//! # Usage
//!
//! ```
//! use agora_ledger::{ConservationResult, Ledger};
//! use agora_types::AgentId;
//!
//! let mut ledger = Ledger::new();
//! ledger.record_buy(1, AgentId::new(0), 100.0).ok();
//! ledger.record_sell(1, AgentId::new(0), 101.0, 10.1).ok();
//!
//! assert_eq!(ledger.verify_conservation(1), ConservationResult::Balanced);
//! ```

pub mod conservation;
pub mod ledger;

// Re-export primary types at crate root.
pub use conservation::ConservationResult;
pub use ledger::Ledger;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agora_types::AgentId;

// ---------------------------------------------------------------------------
// Entry types
// ---------------------------------------------------------------------------

/// A party that can hold cash or assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Account {
    /// An agent on the roster.
    Agent(AgentId),
    /// The market maker on the other side of every trade.
    Market,
    /// Collector of sale tax.
    Treasury,
}

impl core::fmt::Display for Account {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "{id}"),
            Self::Market => f.write_str("market"),
            Self::Treasury => f.write_str("treasury"),
        }
    }
}

/// What an entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Commodity {
    /// Cash balance.
    Cash,
    /// Units of the traded asset.
    Asset,
}

/// Why an entry was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A leg of a buy.
    Purchase,
    /// A leg of a sell.
    Sale,
    /// Tax withheld from a sale.
    Tax,
}

/// One movement of a commodity between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Round the entry was recorded in.
    pub round: u64,
    /// Why the entry exists.
    pub kind: EntryKind,
    /// What moved.
    pub commodity: Commodity,
    /// Debited account.
    pub from: Account,
    /// Credited account.
    pub to: Account,
    /// Amount moved; always strictly positive.
    pub quantity: Decimal,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when recording ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Quantity must be strictly positive.
    #[error("ledger entry quantity must be positive, got {quantity}")]
    NonPositiveQuantity {
        /// The invalid quantity.
        quantity: Decimal,
    },

    /// A floating-point amount has no decimal representation.
    #[error("amount {0} cannot be represented as a decimal")]
    Unrepresentable(String),

    /// An entry must move value between two different accounts.
    #[error("entry debits and credits the same account {0}")]
    SelfTransfer(Account),

    /// An internal error that should not occur in normal operation.
    #[error("internal ledger error: {0}")]
    InternalError(&'static str),
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation violation detected while verifying one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The round where the anomaly was detected.
    pub round: u64,
    /// Per-commodity imbalance: (`debit_total`, `credit_total`).
    pub imbalances: BTreeMap<Commodity, (Decimal, Decimal)>,
    /// Trade kinds whose cash and asset legs do not pair up:
    /// (`cash_legs`, `asset_legs`).
    pub unpaired: BTreeMap<EntryKind, (u64, u64)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
