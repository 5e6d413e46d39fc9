//! Enumeration types for the Agora simulation.
//!
//! The [`Action`] codes are a wire contract with any policy or training
//! harness: the numeric values must never change.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Number of discrete action codes.
pub const ACTION_COUNT: usize = 7;

/// A discrete action an agent submits for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Action {
    /// Do nothing this round.
    Hold,
    /// Buy one unit of the asset at the market price.
    Buy,
    /// Sell one unit of the asset at the market price, net of tax.
    Sell,
    /// Propose a rule change (a new tax rate).
    Propose,
    /// Vote in favour of the active proposal.
    VoteYes,
    /// Vote against the active proposal.
    VoteNo,
    /// Reserved code; behaves like [`Action::Hold`].
    Reserved,
}

impl Action {
    /// Every action, ordered by code.
    pub const ALL: [Self; ACTION_COUNT] = [
        Self::Hold,
        Self::Buy,
        Self::Sell,
        Self::Propose,
        Self::VoteYes,
        Self::VoteNo,
        Self::Reserved,
    ];

    /// Decode a wire action code. Returns `None` for codes outside `0..=6`.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Hold),
            1 => Some(Self::Buy),
            2 => Some(Self::Sell),
            3 => Some(Self::Propose),
            4 => Some(Self::VoteYes),
            5 => Some(Self::VoteNo),
            6 => Some(Self::Reserved),
            _ => None,
        }
    }

    /// The wire action code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Hold => 0,
            Self::Buy => 1,
            Self::Sell => 2,
            Self::Propose => 3,
            Self::VoteYes => 4,
            Self::VoteNo => 5,
            Self::Reserved => 6,
        }
    }

    /// Human-readable label used in logs and state dumps.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Propose => "propose",
            Self::VoteYes => "vote_yes",
            Self::VoteNo => "vote_no",
            Self::Reserved => "reserved",
        }
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// Side of a market trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum TradeKind {
    /// Agent bought one unit from the market.
    Buy,
    /// Agent sold one unit to the market.
    Sell,
}

impl TradeKind {
    /// The `action_type` string written to the transactions log.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

// ---------------------------------------------------------------------------
// Governance
// ---------------------------------------------------------------------------

/// A system parameter that a proposal can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum GovernanceRule {
    /// The market tax rate applied to sale proceeds.
    TaxRate,
}

impl GovernanceRule {
    /// Stable name used in governance log details.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaxRate => "tax_rate",
        }
    }
}

/// Result of tallying a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum VoteOutcome {
    /// Yes weight strictly exceeded no weight.
    Passed,
    /// Yes weight did not exceed no weight (ties fail).
    Failed,
}

impl VoteOutcome {
    /// Whether the proposal passed.
    pub const fn is_passed(self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Stable name used in governance log details.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// Lifecycle phase of the governance engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum GovernancePhase {
    /// No proposal; a new one may be started.
    #[default]
    Idle,
    /// A proposal is collecting votes.
    Active,
    /// The active proposal has been tallied and awaits `end_voting_period`.
    Tallied,
}

/// Kind of event written to the governance log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GovernanceEventKind {
    /// A proposal entered the `Active` phase.
    ProposalStarted,
    /// An eligible agent voted on the active proposal.
    VoteCast,
    /// The active proposal was tallied.
    ProposalTallied,
    /// A passed proposal changed a market parameter.
    RuleApplied,
    /// The voting period closed and the engine returned to `Idle`.
    VotingPeriodEnded,
}

impl GovernanceEventKind {
    /// The `event_type` string written to the governance log.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProposalStarted => "proposal_started",
            Self::VoteCast => "vote_cast",
            Self::ProposalTallied => "proposal_tallied",
            Self::RuleApplied => "rule_applied",
            Self::VotingPeriodEnded => "voting_period_ended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes_are_stable() {
        let codes: Vec<u8> = Action::ALL.iter().map(|a| a.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn action_code_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_code(action.code()), Some(action));
        }
    }

    #[test]
    fn unknown_action_codes_are_rejected() {
        assert_eq!(Action::from_code(7), None);
        assert_eq!(Action::from_code(u8::MAX), None);
    }

    #[test]
    fn wire_strings() {
        assert_eq!(TradeKind::Buy.as_str(), "buy");
        assert_eq!(TradeKind::Sell.as_str(), "sell");
        assert_eq!(GovernanceRule::TaxRate.as_str(), "tax_rate");
        assert_eq!(VoteOutcome::Failed.as_str(), "failed");
        assert_eq!(GovernanceEventKind::VoteCast.as_str(), "vote_cast");
    }

    #[test]
    fn default_phase_is_idle() {
        assert_eq!(GovernancePhase::default(), GovernancePhase::Idle);
    }
}
