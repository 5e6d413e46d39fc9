//! Starting balances and voting-power configuration for agents.
//!
//! The engine builds a [`StartingState`] from the `agents` section of
//! `agora-config.yaml` on every reset; tests construct it directly.

use agora_types::AgentState;

/// Canonical starting balances applied to every agent on reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartingState {
    /// Starting cash (default: 1000.0).
    pub cash: f64,
    /// Starting asset units (default: 0).
    pub assets: u32,
    /// Starting governance tokens (default: 100).
    pub tokens: u32,
    /// Starting reputation (default: 1.0).
    pub reputation: f64,
}

impl Default for StartingState {
    fn default() -> Self {
        Self {
            cash: 1000.0,
            assets: 0,
            tokens: 100,
            reputation: 1.0,
        }
    }
}

impl StartingState {
    /// Build a fresh agent record with no history.
    pub fn agent_state(&self, mode: VotingPowerMode) -> AgentState {
        AgentState {
            cash: self.cash,
            assets: self.assets,
            reputation: self.reputation,
            tokens: self.tokens,
            voting_power: mode.voting_power(self.reputation),
            last_action: None,
            total_trades: 0,
        }
    }
}

/// How an agent's voting power is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VotingPowerMode {
    /// Every vote weighs 1.0.
    Flat,
    /// Voting power tracks reputation.
    #[default]
    Reputation,
}

impl VotingPowerMode {
    /// Voting power for an agent with the given reputation.
    pub const fn voting_power(self, reputation: f64) -> f64 {
        match self {
            Self::Flat => 1.0,
            Self::Reputation => reputation,
        }
    }

    /// Map the `weighted_votes` config flag to a mode.
    pub const fn from_weighted(weighted: bool) -> Self {
        if weighted { Self::Reputation } else { Self::Flat }
    }
}
