//! Per-round reward calculation.
//!
//! A round's reward for one agent is
//!
//! ```text
//! (net_worth_after - net_worth_before) + (reputation_after - reputation_before) * 10
//! ```
//!
//! where each net worth is valued at the price prevailing when its
//! snapshot was captured. Governance bonuses are accumulated on top after
//! the tally and never overwrite the economic or reputation components.

use std::collections::BTreeMap;

use agora_types::{AgentId, AgentState};

use crate::governance::TallyResult;
use crate::store::AgentStore;

/// Multiplier applied to a round's reputation change.
pub const REPUTATION_REWARD_SCALE: f64 = 10.0;
/// Reward granted to the proposer of a tallied proposal.
pub const PROPOSER_REWARD: f64 = 50.0;
/// Reputation granted to the proposer of a tallied proposal.
pub const PROPOSER_REPUTATION_BONUS: f64 = 0.25;
/// Reward granted to each voter on the winning side.
pub const VOTER_REWARD: f64 = 10.0;
/// Reputation granted to each voter on the winning side.
pub const VOTER_REPUTATION_BONUS: f64 = 0.1;

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// An immutable copy of every agent record, valued at one price.
#[derive(Debug, Clone, PartialEq)]
pub struct NetWorthSnapshot {
    /// Price used to value asset holdings.
    pub price: f64,
    /// Agent records at capture time.
    pub states: BTreeMap<AgentId, AgentState>,
}

impl NetWorthSnapshot {
    /// Capture the store at the given price.
    pub fn capture(store: &AgentStore, price: f64) -> Self {
        Self {
            price,
            states: store.snapshot(),
        }
    }

    /// Net worth of one agent at the snapshot price.
    pub fn net_worth(&self, agent_id: AgentId) -> Option<f64> {
        self.states
            .get(&agent_id)
            .map(|state| state.net_worth(self.price))
    }
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// The components of one agent's reward for one round.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardBreakdown {
    /// Change in net worth.
    pub economic: f64,
    /// Scaled change in reputation.
    pub reputation: f64,
    /// Proposer and voter bonuses.
    pub governance: f64,
}

impl RewardBreakdown {
    /// The scalar reward.
    pub fn total(&self) -> f64 {
        self.economic + self.reputation + self.governance
    }
}

/// Rewards for every agent in one round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoundRewards {
    breakdown: BTreeMap<AgentId, RewardBreakdown>,
}

impl RoundRewards {
    /// Score every agent in `after` against its record in `before`.
    ///
    /// Agents absent from `before` score zero for the economic and
    /// reputation components.
    pub fn between(before: &NetWorthSnapshot, after: &NetWorthSnapshot) -> Self {
        let breakdown = after
            .states
            .iter()
            .map(|(id, now)| {
                let entry = before.states.get(id).map_or_else(
                    RewardBreakdown::default,
                    |then| RewardBreakdown {
                        economic: now.net_worth(after.price) - then.net_worth(before.price),
                        reputation: (now.reputation - then.reputation) * REPUTATION_REWARD_SCALE,
                        governance: 0.0,
                    },
                );
                (*id, entry)
            })
            .collect();
        Self { breakdown }
    }

    /// Add a governance bonus to an agent's reward.
    pub fn add_governance(&mut self, agent_id: AgentId, amount: f64) {
        self.breakdown.entry(agent_id).or_default().governance += amount;
    }

    /// The breakdown for one agent.
    pub fn get(&self, agent_id: AgentId) -> Option<&RewardBreakdown> {
        self.breakdown.get(&agent_id)
    }

    /// Scalar reward for one agent, zero if absent.
    pub fn total_for(&self, agent_id: AgentId) -> f64 {
        self.get(agent_id).map_or(0.0, RewardBreakdown::total)
    }

    /// Scalar rewards for every agent.
    pub fn totals(&self) -> BTreeMap<AgentId, f64> {
        self.breakdown
            .iter()
            .map(|(id, parts)| (*id, parts.total()))
            .collect()
    }

    /// Iterate breakdowns in ascending agent order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &RewardBreakdown)> {
        self.breakdown.iter().map(|(id, parts)| (*id, parts))
    }
}

// ---------------------------------------------------------------------------
// Governance bonuses
// ---------------------------------------------------------------------------

/// A reward and reputation grant earned through governance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernanceBonus {
    /// Recipient.
    pub agent_id: AgentId,
    /// Reward added to the round.
    pub reward: f64,
    /// Reputation added to the agent's record.
    pub reputation: f64,
}

/// Bonuses owed for a tallied proposal.
///
/// The proposer is paid whatever the outcome; each voter on the winning
/// side is paid once. A proposer who also voted with the winners receives
/// both grants.
pub fn governance_bonuses(tally: &TallyResult) -> Vec<GovernanceBonus> {
    let proposer = GovernanceBonus {
        agent_id: tally.proposal.proposer,
        reward: PROPOSER_REWARD,
        reputation: PROPOSER_REPUTATION_BONUS,
    };
    std::iter::once(proposer)
        .chain(
            tally
                .winning_voters()
                .into_iter()
                .map(|agent_id| GovernanceBonus {
                    agent_id,
                    reward: VOTER_REWARD,
                    reputation: VOTER_REPUTATION_BONUS,
                }),
        )
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agora_types::{GovernanceRule, Proposal, ProposalId, Vote, VoteOutcome};

    use super::*;
    use crate::config::{StartingState, VotingPowerMode};
    use crate::store::AgentDelta;

    fn store() -> AgentStore {
        AgentStore::initialize(
            &AgentId::roster(2),
            &StartingState::default(),
            VotingPowerMode::Reputation,
        )
        .unwrap()
    }

    #[test]
    fn reward_uses_price_at_each_snapshot() {
        let mut store = store();
        let id = AgentId::new(0);
        store
            .apply_delta(
                id,
                &AgentDelta {
                    cash: -100.0,
                    assets: 1,
                    reputation: 0.01,
                    ..AgentDelta::default()
                },
            )
            .unwrap();
        let before = NetWorthSnapshot::capture(&store, 100.0);
        let after = NetWorthSnapshot::capture(&store, 110.0);

        let rewards = RoundRewards::between(&before, &after);
        let parts = rewards.get(id).unwrap();
        assert!((parts.economic - 10.0).abs() < 1e-9);
        assert!(parts.reputation.abs() < 1e-9);
    }

    #[test]
    fn buy_at_fair_price_scores_reputation_only() {
        let mut store = store();
        let id = AgentId::new(1);
        let before = NetWorthSnapshot::capture(&store, 100.0);
        store
            .apply_delta(
                id,
                &AgentDelta {
                    cash: -100.0,
                    assets: 1,
                    reputation: 0.01,
                    trades: 1,
                    ..AgentDelta::default()
                },
            )
            .unwrap();
        let after = NetWorthSnapshot::capture(&store, 100.0);

        let rewards = RoundRewards::between(&before, &after);
        assert!((rewards.total_for(id) - 0.1).abs() < 1e-9);
        assert!(rewards.total_for(AgentId::new(0)).abs() < 1e-9);
    }

    #[test]
    fn governance_bonus_accumulates() {
        let store = store();
        let snap = NetWorthSnapshot::capture(&store, 100.0);
        let mut rewards = RoundRewards::between(&snap, &snap);
        let id = AgentId::new(0);
        rewards.add_governance(id, PROPOSER_REWARD);
        rewards.add_governance(id, VOTER_REWARD);
        assert!((rewards.total_for(id) - 60.0).abs() < 1e-9);
        assert!((rewards.totals().get(&id).copied().unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn bonuses_pay_proposer_and_winning_side() {
        let votes = BTreeMap::from([
            (AgentId::new(0), Vote { choice: true, weight: 2.0 }),
            (AgentId::new(1), Vote { choice: false, weight: 1.0 }),
            (AgentId::new(2), Vote { choice: true, weight: 1.0 }),
        ]);
        let tally = TallyResult {
            proposal: Proposal {
                id: ProposalId(1),
                proposer: AgentId::new(0),
                rule: GovernanceRule::TaxRate,
                value: 0.1,
                start_step: 0,
            },
            outcome: VoteOutcome::Passed,
            yes_weight: 3.0,
            no_weight: 1.0,
            votes,
        };

        let bonuses = governance_bonuses(&tally);
        let recipients: Vec<AgentId> = bonuses.iter().map(|b| b.agent_id).collect();
        assert_eq!(recipients, vec![AgentId::new(0), AgentId::new(0), AgentId::new(2)]);

        let proposer_total: f64 = bonuses
            .iter()
            .filter(|b| b.agent_id == AgentId::new(0))
            .map(|b| b.reward)
            .sum();
        assert!((proposer_total - 60.0).abs() < 1e-9);
    }
}
