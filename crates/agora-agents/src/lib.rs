//! Agent state, market rules, governance, and rewards for the Agora
//! simulation.
//!
//! This crate contains the logic layer of the engine -- everything that
//! operates on agent and market state without touching I/O or randomness.
//! It sits between `agora-types` (the data structures) and `agora-core`
//! (which drives rounds and owns configuration).
//!
//! # Modules
//!
//! - [`config`] -- Starting balances and voting-power mode ([`StartingState`])
//! - [`error`] -- Error types for agent operations ([`AgentError`])
//! - [`store`] -- The per-agent record store ([`AgentStore`])
//! - [`market`] -- Price and tax state with buy/sell impact rules ([`Market`])
//! - [`governance`] -- Proposal/vote/tally state machine ([`GovernanceEngine`])
//! - [`reward`] -- Net-worth snapshots and per-round rewards ([`RoundRewards`])
//! - [`observation`] -- Projection of agent and market state into observations

pub mod config;
pub mod error;
pub mod governance;
pub mod market;
pub mod observation;
pub mod reward;
pub mod store;

// Re-export primary types at crate root for convenience.
pub use config::{StartingState, VotingPowerMode};
pub use error::AgentError;
pub use governance::{DEFAULT_VOTE_WEIGHT, GovernanceEngine, GovernanceRejection, TallyResult};
pub use market::{Fill, Market, MarketError, REPUTATION_PER_TRADE};
pub use observation::{observe, observe_all};
pub use reward::{
    GovernanceBonus, NetWorthSnapshot, PROPOSER_REPUTATION_BONUS, PROPOSER_REWARD,
    REPUTATION_REWARD_SCALE, RewardBreakdown, RoundRewards, VOTER_REPUTATION_BONUS, VOTER_REWARD,
    governance_bonuses,
};
pub use store::{AgentDelta, AgentStore};
