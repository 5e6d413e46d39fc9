//! Core records for the Agora simulation: agents, the market, proposals,
//! and votes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Action, GovernanceRule};
use crate::ids::{AgentId, ProposalId};

// ---------------------------------------------------------------------------
// AgentState
// ---------------------------------------------------------------------------

/// Economic record of a single agent.
///
/// Mutated in place during a round. No field is clamped by the type itself;
/// the market and governance engine guard their own preconditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentState {
    /// Cash balance.
    pub cash: f64,
    /// Units of the traded asset held.
    pub assets: u32,
    /// Reputation score, starts at 1.0 and is unbounded above.
    pub reputation: f64,
    /// Governance token balance.
    pub tokens: u32,
    /// Weight applied to this agent's votes.
    pub voting_power: f64,
    /// The action taken in the most recent round, if any.
    pub last_action: Option<Action>,
    /// Number of successful trades (never decreases).
    pub total_trades: u32,
}

impl AgentState {
    /// Net worth at the given asset price: `cash + assets * price`.
    pub fn net_worth(&self, price: f64) -> f64 {
        f64::from(self.assets).mul_add(price, self.cash)
    }
}

// ---------------------------------------------------------------------------
// MarketState
// ---------------------------------------------------------------------------

/// Global market parameters shared by every agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MarketState {
    /// Current asset price (strictly positive).
    pub price: f64,
    /// Tax applied to sale proceeds, in `[0, 1]`.
    pub tax_rate: f64,
    /// Multiplicative price impact of one trade (strictly above 1).
    pub volatility_factor: f64,
}

// ---------------------------------------------------------------------------
// Governance records
// ---------------------------------------------------------------------------

/// A pending change to one system parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Proposal {
    /// Unique identifier assigned at creation.
    pub id: ProposalId,
    /// The agent who proposed the change.
    pub proposer: AgentId,
    /// The parameter to change.
    pub rule: GovernanceRule,
    /// The proposed new value.
    pub value: f64,
    /// Round number at which the proposal was created.
    pub start_step: u64,
}

/// One agent's vote on the active proposal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vote {
    /// `true` for yes, `false` for no.
    pub choice: bool,
    /// Influence of this vote on the tally.
    pub weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_worth_values_assets_at_price() {
        let state = AgentState {
            cash: 900.0,
            assets: 2,
            reputation: 1.0,
            tokens: 100,
            voting_power: 1.0,
            last_action: None,
            total_trades: 0,
        };
        assert!((state.net_worth(50.0) - 1000.0).abs() < 1e-9);
        assert!((state.net_worth(0.0) - 900.0).abs() < 1e-9);
    }

    #[test]
    fn agent_state_serde_round_trip() {
        let state = AgentState {
            cash: 12.5,
            assets: 3,
            reputation: 1.25,
            tokens: 7,
            voting_power: 1.25,
            last_action: Some(Action::Sell),
            total_trades: 4,
        };
        let json = serde_json::to_string(&state).unwrap_or_default();
        let restored: Option<AgentState> = serde_json::from_str(&json).ok();
        assert_eq!(restored, Some(state));
    }
}
